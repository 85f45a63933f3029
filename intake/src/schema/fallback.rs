//! Built-in fixed fields used when an entity's schema cannot be loaded

use super::types::{DataType, EntityName, FieldDefinition, SchemaDescriptor};

type FieldSpec = (&'static str, DataType, bool);

const APPLICANT_FIELDS: &[FieldSpec] = &[
    ("first_name", DataType::String, true),
    ("first_surname", DataType::String, true),
    ("second_surname", DataType::String, false),
    ("document_type", DataType::String, true),
    ("document_number", DataType::String, true),
    ("birth_date", DataType::Date, true),
    ("gender", DataType::String, true),
    ("email", DataType::String, true),
    ("phone", DataType::String, false),
    ("marital_status", DataType::String, false),
    ("dependents", DataType::Number, false),
];

const LOCATION_FIELDS: &[FieldSpec] = &[
    ("address", DataType::String, true),
    ("city", DataType::String, true),
    ("department", DataType::String, true),
    ("address_type", DataType::String, true),
    ("neighborhood", DataType::String, false),
    ("stratum", DataType::Number, false),
];

const ECONOMIC_ACTIVITY_FIELDS: &[FieldSpec] = &[
    ("company", DataType::String, false),
    ("position", DataType::String, false),
    ("contract_type", DataType::String, false),
    ("base_salary", DataType::Number, false),
    ("activity_type", DataType::String, true),
    ("economic_sector", DataType::String, false),
    ("company_city", DataType::String, false),
    ("company_phone", DataType::String, false),
];

const FINANCIAL_INFO_FIELDS: &[FieldSpec] = &[
    ("monthly_income", DataType::Number, true),
    ("monthly_expenses", DataType::Number, true),
    ("other_income", DataType::Number, false),
    ("total_assets", DataType::Number, false),
    ("total_liabilities", DataType::Number, false),
];

const REFERENCE_FIELDS: &[FieldSpec] = &[
    ("full_name", DataType::String, true),
    ("reference_phone", DataType::String, true),
    ("reference_type", DataType::String, true),
    ("relationship", DataType::String, false),
    ("reference_city", DataType::String, false),
];

const CREDIT_APPLICATION_FIELDS: &[FieldSpec] = &[
    ("requested_amount", DataType::Number, true),
    ("term_months", DataType::Number, true),
    ("credit_type", DataType::String, true),
    ("credit_purpose", DataType::String, true),
    ("down_payment", DataType::Number, false),
    ("application_city", DataType::String, false),
    ("bank_name", DataType::String, false),
];

/// Schema with only the built-in fixed fields of `entity`
pub fn fallback_schema(entity: EntityName) -> SchemaDescriptor {
    let specs = match entity {
        EntityName::Applicant => APPLICANT_FIELDS,
        EntityName::Location => LOCATION_FIELDS,
        EntityName::EconomicActivity => ECONOMIC_ACTIVITY_FIELDS,
        EntityName::FinancialInfo => FINANCIAL_INFO_FIELDS,
        EntityName::Reference => REFERENCE_FIELDS,
        EntityName::CreditApplication => CREDIT_APPLICATION_FIELDS,
    };

    let fixed_fields = specs
        .iter()
        .zip(1_u32..)
        .map(|((key, data_type, required), order)| {
            let mut field = FieldDefinition::new(*key, *data_type, *required);
            field.order_index = order;
            field
        })
        .collect();

    SchemaDescriptor {
        entity_name: entity,
        fixed_fields,
        dynamic_fields: Vec::new(),
    }
}
