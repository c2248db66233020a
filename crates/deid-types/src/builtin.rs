//! Builtin semantic type catalogue.

use deid_model::ActionKind::{
    FreeTextReplacement, LowerResolution, Mask, Omit, Offset, RandomOffset, SaltedMask,
};
use deid_model::PrimitiveType;

use crate::semantic::{AgeGrouping, SemanticType, SemanticTypeBuilder, ValueCheck, ValueDomain};

const REPLACEMENT: &str = "replacement";
const INTERVAL: &str = "interval";
const STD_DEV: &str = "std_dev";
const MAPPING: &str = "mapping";
const DATE_RESOLUTION: [&str; 3] = ["keep_year", "keep_month", "keep_day"];

/// Omit, Mask and SaltedMask: the identifier-style action set.
fn identifying(builder: SemanticTypeBuilder) -> SemanticTypeBuilder {
    builder
        .action(Omit)
        .action_with(Mask, [REPLACEMENT])
        .action(SaltedMask)
}

fn numeric(builder: SemanticTypeBuilder) -> SemanticTypeBuilder {
    builder
        .domain(ValueDomain::Numeric)
        .primitives([PrimitiveType::Int, PrimitiveType::Float])
        .action(Omit)
        .action_with(Mask, [REPLACEMENT])
        .action_with(Offset, [INTERVAL])
        .action_with(RandomOffset, [STD_DEV])
}

fn temporal(builder: SemanticTypeBuilder) -> SemanticTypeBuilder {
    builder
        .domain(ValueDomain::Temporal)
        .primitives([PrimitiveType::Date, PrimitiveType::String])
        .action(Omit)
        .action_with(Mask, [REPLACEMENT])
        .action_with(Offset, [INTERVAL])
        .action_with(RandomOffset, [STD_DEV])
        .action_with(LowerResolution, DATE_RESOLUTION)
        .age_grouping(AgeGrouping::CapDate)
        .fallback("1900-01-01")
}

pub fn builtin_types() -> Vec<SemanticType> {
    vec![
        identifying(SemanticType::builder("Name"))
            .primitives([PrimitiveType::String])
            .fallback("Jane Doe")
            .finish(),
        identifying(SemanticType::builder("Address"))
            .primitives([PrimitiveType::String])
            .fallback("123 Main St")
            .finish(),
        identifying(SemanticType::builder("Phone Number").alias("phone"))
            .primitives([PrimitiveType::String, PrimitiveType::Int])
            .value_check(ValueCheck::PhoneNumber)
            .fallback("000-000-0000")
            .finish(),
        identifying(SemanticType::builder("Identifier").alias("id"))
            .primitives([PrimitiveType::String, PrimitiveType::Int])
            .fallback("0")
            .finish(),
        identifying(SemanticType::builder("SSN").alias("social security number"))
            .primitives([PrimitiveType::String])
            .value_check(ValueCheck::Ssn)
            .fallback("000-00-0000")
            .finish(),
        identifying(SemanticType::builder("Email").alias("email address"))
            .primitives([PrimitiveType::String])
            .value_check(ValueCheck::Email)
            .fallback("redacted@example.com")
            .finish(),
        identifying(SemanticType::builder("IP Address").alias("ip"))
            .primitives([PrimitiveType::String])
            .value_check(ValueCheck::IpAddress)
            .fallback("0.0.0.0")
            .finish(),
        numeric(SemanticType::builder("Age"))
            .age_grouping(AgeGrouping::CapAge)
            .fallback("0")
            .finish(),
        numeric(SemanticType::builder("Number").alias("numeric"))
            .fallback("0")
            .finish(),
        temporal(SemanticType::builder("Date")).finish(),
        temporal(SemanticType::builder("Birth Date").alias("birthdate").alias("dob")).finish(),
        identifying(SemanticType::builder("Zip Code").alias("zip").alias("zipcode"))
            .primitives([PrimitiveType::String, PrimitiveType::Int])
            .action(LowerResolution)
            .fallback("00000")
            .finish(),
        SemanticType::builder("Free Text")
            .alias("text")
            .alias("freetext")
            .primitives([PrimitiveType::String])
            .action(Omit)
            .action_with(Mask, [REPLACEMENT])
            .action_with(FreeTextReplacement, [MAPPING])
            .fallback("[REDACTED]")
            .finish(),
        SemanticType::builder("Boolean")
            .alias("bool")
            .domain(ValueDomain::Boolean)
            .primitives([PrimitiveType::Boolean, PrimitiveType::String])
            .action(Omit)
            .action_with(Mask, [REPLACEMENT])
            .fallback("false")
            .finish(),
    ]
}
