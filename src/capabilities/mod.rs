pub mod deprecation;
pub mod registry;
pub mod validator;

pub use deprecation::{DeprecationTable, BUILTIN_DEPRECATED_CAPABILITIES};
pub use registry::{
    MergedStepMetadata, RegistryError, ResolvedStepMetadata, StepMetadata, StepMetadataCatalog,
    StepMetadataRegistry, HOST_SUPPLEMENT_OWNER,
};
pub use validator::{
    validate_capabilities, CapabilityError, CapabilityGap, CapabilityRemap, CapabilityValidation,
    ProviderAdvertisement, StepRequirement,
};
