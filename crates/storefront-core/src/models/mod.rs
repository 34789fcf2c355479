//! Data models for storefront entities.
//!
//! - `Product`, `ProductPage`, `Category`: catalog browsing
//! - `Cart`, `CartItem`, `CartItemInput`: the shopping cart
//! - `Order`, `OrderStatus`, `CheckoutRequest`, `Warranty`: checkout and history
//! - `UserProfile`, `Credentials`: the logged-in account

pub mod cart;
pub mod order;
pub mod product;
pub mod user;

pub use cart::{Cart, CartItem, CartItemInput};
pub use order::{CheckoutRequest, Order, OrderLine, OrderStatus, Warranty};
pub use product::{Category, Product, ProductPage};
pub use user::{Credentials, UserProfile};
