pub mod call;
pub mod db;
pub mod tools;
