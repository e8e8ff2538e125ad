//! SR-IOV host discovery
//!
//! Finds the physical function that virtual functions are taken from.

mod selector;

pub use selector::{
    scan_interfaces, select_from, select_sriov_interface, Carrier, InterfaceRecord, Rejection,
    SelectorError, SelectorPolicy,
};
