mod default_schedule;
