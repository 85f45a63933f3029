//! Shared constants: record layout keys, collaborator endpoints and configuration names

use std::time::Duration;

// Record layout keys

/// Singleton container holding the applicant identity
pub const PRINCIPAL: &str = "principal";
/// List of residence/work locations
pub const LOCATIONS: &str = "locations";
/// Singleton economic activity container
pub const ECONOMIC_ACTIVITY: &str = "economic_activity";
/// Singleton financial information container
pub const FINANCIAL_INFO: &str = "financial_info";
/// List of personal/commercial references
pub const REFERENCES: &str = "references";
/// List of credit applications
pub const APPLICATIONS: &str = "applications";

/// Open extension bag on the principal and on references
pub const EXTENSION: &str = "extension";
/// Open extension bag on locations, economic activity and financial info
pub const DETAIL_EXTENSION: &str = "detail_extension";
/// Map of type-specific containers
pub const TYPE_CONTAINERS: &str = "type_containers";
/// Credit detail block on an application
pub const CREDIT_DETAIL: &str = "credit_detail";
/// Type selector field inside a credit detail block or on a reference
pub const TYPE_SELECTOR: &str = "type_selector";
/// Remote identity of a persisted reference
pub const IDENTITY: &str = "identity";

/// Keys that describe record structure and never count as fixed fields
pub const STRUCTURAL_KEYS: &[&str] = &[
    EXTENSION,
    DETAIL_EXTENSION,
    TYPE_CONTAINERS,
    CREDIT_DETAIL,
    IDENTITY,
];

/// Schema key whose value selects the active credit-type container
pub const CREDIT_TYPE_FIELD: &str = "credit_type";
/// Schema key carrying a reference's type
pub const REFERENCE_TYPE_FIELD: &str = "reference_type";
/// Type assigned to references that never had one
pub const DEFAULT_REFERENCE_TYPE: &str = "personal";
/// Container used when a credit type matches nothing in the routing table
pub const GENERIC_DETAIL_CONTAINER: &str = "generic_detail";

/// Legacy identity aliases still produced by older reference listings
pub const LEGACY_IDENTITY_KEYS: &[&str] = &["reference_id", "id"];

// Schema normalization

/// Order assigned to fields without an explicit `order_index`
pub const DEFAULT_ORDER_INDEX: u32 = 999;

/// Field keys that are always dates regardless of what the schema says
pub const DATE_FIELD_KEYS: &[&str] = &[
    "birth_date",
    "document_issue_date",
    "employment_start_date",
    "affiliation_date",
];

// Collaborator endpoints

/// Schema fetch, followed by `/{entity}`
pub const SCHEMA_PATH: &str = "/schema";
/// Subject records, followed by `/{subject}/records`
pub const SUBJECTS_PATH: &str = "/subjects";
/// Reference add
pub const REFERENCES_ADD_PATH: &str = "/references/add";
/// Reference update
pub const REFERENCES_UPDATE_PATH: &str = "/references/update";
/// Reference delete
pub const REFERENCES_DELETE_PATH: &str = "/references/delete";
/// Reference listing for a subject
pub const REFERENCES_BY_SUBJECT_PATH: &str = "/references/by-subject";

/// Header carrying the tenant id
pub const TENANT_HEADER: &str = "X-Tenant-Id";
/// Header carrying the acting user id
pub const USER_HEADER: &str = "X-User-Id";

// Configuration

/// Environment variable for the collaborator base URL
pub const BASE_URL_ENV_VAR: &str = "INTAKE_API_BASE_URL";
/// Environment variable for the tenant id
pub const TENANT_ID_ENV_VAR: &str = "INTAKE_TENANT_ID";
/// Environment variable for the acting user id
pub const USER_ID_ENV_VAR: &str = "INTAKE_USER_ID";
/// Environment variable for the bearer token
pub const ACCESS_TOKEN_ENV_VAR: &str = "INTAKE_ACCESS_TOKEN";
/// Environment variable for the schema cache TTL in seconds
pub const SCHEMA_TTL_ENV_VAR: &str = "INTAKE_SCHEMA_TTL_SECS";
/// Environment variable for the per-request timeout in seconds
pub const REQUEST_TIMEOUT_ENV_VAR: &str = "INTAKE_REQUEST_TIMEOUT_SECS";
/// Environment variable for aggregate fetch retries
pub const FETCH_RETRIES_ENV_VAR: &str = "INTAKE_FETCH_RETRIES";
/// Environment variable enabling the legacy credit-type mirror write
pub const CREDIT_TYPE_MIRROR_ENV_VAR: &str = "INTAKE_CREDIT_TYPE_MIRROR";
/// Environment variable for the default tracing level
pub const LOG_LEVEL_ENV_VAR: &str = "INTAKE_LOG_LEVEL";
/// Environment variable for per-module filter directives, e.g. `credit_intake::reconcile=debug`
pub const LOG_FILTER_ENV_VAR: &str = "INTAKE_LOG_FILTER";

/// Default collaborator base URL
pub const DEFAULT_BASE_URL: &str = "http://localhost:5000";
/// Default tenant id
pub const DEFAULT_TENANT_ID: u64 = 1;
/// Default schema cache TTL
pub const DEFAULT_SCHEMA_TTL: Duration = Duration::from_secs(5 * 60);
/// Default per-request timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Default number of aggregate fetch retries on not-found
pub const DEFAULT_FETCH_RETRIES: u32 = 3;
/// Upper bound on the backoff between aggregate fetch retries
pub const MAX_FETCH_BACKOFF: Duration = Duration::from_secs(3);

/// Trace log file name inside the temp directory
pub const TRACE_LOG_FILE: &str = "credit_intake_trace.log";
