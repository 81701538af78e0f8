//! Local network interface enumeration.
//!
//! Answers "what is this device's address" for apps that display it next to
//! a running server, plus general interface listing.
//!
//! ```ignore
//! use portside_net::netinfo;
//!
//! let ip = netinfo::device_ip_address()?;
//! println!("reachable at {ip}");
//!
//! for iface in netinfo::NetworkInterface::list() {
//!     println!("{} ({}) up={}", iface.name, iface.interface_type, iface.is_up);
//! }
//! ```

mod interface;

pub use interface::{
    InterfaceType, Ipv4Info, Ipv6Info, MacAddress, NetworkInterface, device_ip_address,
};
