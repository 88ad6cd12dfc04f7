pub mod branch;
pub mod offer;
pub mod plan;
pub mod profile;
pub mod retailer;
pub mod role;
pub mod user;

pub use branch::{Branch, GeoPoint};
pub use offer::Offer;
pub use plan::Plan;
pub use profile::Profile;
pub use retailer::Retailer;
pub use role::Role;
pub use user::User;
