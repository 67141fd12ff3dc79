pub mod address;
pub mod cart;
pub mod cart_item;
pub mod checkout_session;
pub mod coupon;
pub mod customer;
pub mod notification;
pub mod notification_preference;
pub mod order;
pub mod order_item;
pub mod product;
pub mod review;

pub use address::Entity as Address;
pub use cart::{Entity as Cart, Model as CartModel};
pub use cart_item::{Entity as CartItem, Model as CartItemModel};
pub use checkout_session::Entity as CheckoutSession;
pub use coupon::{Entity as Coupon, Model as CouponModel};
pub use customer::Entity as Customer;
pub use notification::Entity as Notification;
pub use notification_preference::Entity as NotificationPreference;
pub use order::{Entity as Order, Model as OrderModel};
pub use order_item::Entity as OrderItem;
pub use product::{Entity as Product, Model as ProductModel};
pub use review::Entity as Review;
