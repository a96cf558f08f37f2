pub mod access;
pub mod propagate;
