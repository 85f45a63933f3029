//! Credit-type detail routing

mod router;
mod table;

pub use router::{
    CreditRouter, active_type, route_type_selector, type_container_path, type_containers_path,
    type_selector_path,
};
pub use table::{
    CONSUMER_CONTAINER, CreditTypeTable, FREE_INVESTMENT_CONTAINER, MORTGAGE_CONTAINER,
    VEHICLE_CONTAINER, normalize_selector,
};
