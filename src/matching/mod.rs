pub mod manager;
pub mod normalize;
pub mod scope;
pub mod scorer;
pub mod selector;
pub mod tiered;
