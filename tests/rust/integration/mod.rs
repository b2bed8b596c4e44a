mod scripted;
mod strategy_tests;
mod yaml_tests;
