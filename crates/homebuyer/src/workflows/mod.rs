pub mod buyer;
