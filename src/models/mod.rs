pub mod driver;
pub mod location;
pub mod order;
pub mod tariff;
pub mod withdrawal;
