pub mod fixture;

mod scenarios;
