//! Model module
//!
//! ResNet-18 in Burn plus the [`Network`] capability the predictor runs on.

pub mod network;
pub mod resnet;

pub use network::{load_resnet18, BurnNetwork, Logits, Network, NetworkLoader, ResNetLoader};
pub use resnet::{BasicBlock, ResNet18, ResNet18Config};
