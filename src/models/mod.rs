mod cart;
mod file;
mod order;
mod seller_account;
mod snapshot;
mod user;

pub use cart::*;
pub use file::*;
pub use order::*;
pub use seller_account::*;
pub use snapshot::*;
pub use user::*;
