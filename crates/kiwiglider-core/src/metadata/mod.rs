// crates/kiwiglider-core/src/metadata/mod.rs

pub mod builder;
pub mod defaults;
pub mod record;
pub mod sheet;

pub use builder::{DeploymentBuilder, DeploymentOverrides};
pub use defaults::{deployment_name, naming_authority};
pub use record::{DeploymentRecord, RecordValue};
pub use sheet::{CsvDeploymentSheet, DeploymentSource};
