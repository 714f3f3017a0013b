//! OpenAPI documentation aggregator.
//!
//! Collects all `#[utoipa::path]`-annotated handlers and `ToSchema`-derived
//! types into a single OpenAPI 3.1 document, served via Scalar UI at `/docs`.

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "SMARTD Studio API",
        version = "0.1.0",
        description = "Accounts, saved Neo4j databases, and schema/entity browsing for the graph playground.",
    ),
    tags(
        (name = "Health", description = "Server liveness and store counts"),
        (name = "Pages", description = "Landing routes used by the frontend router"),
        (name = "Auth", description = "Signup and login gated on a Neo4j connection test"),
        (name = "Databases", description = "Per-user saved databases with encrypted credentials"),
        (name = "Graph", description = "Schema overview and node/relationship entities of the selected database"),
    ),
    paths(
        // Health
        crate::api::health::health,
        // Pages
        crate::api::pages::root,
        crate::api::pages::home,
        crate::api::pages::playground,
        // Auth
        crate::api::auth::signup,
        crate::api::auth::login,
        crate::api::auth::logout,
        // Databases
        crate::api::databases::list_databases,
        crate::api::databases::add_database,
        crate::api::databases::select_database,
        crate::api::databases::delete_database,
        // Graph
        crate::api::graph::database_info,
        crate::api::graph::node_entities,
        crate::api::graph::relationship_entities,
    ),
    components(schemas(
        crate::api::ErrorResponse,
        crate::api::MessageResponse,
        crate::api::health::HealthResponse,
        crate::api::pages::HomeResponse,
        crate::api::pages::PlaygroundResponse,
        crate::api::auth::SignupRequest,
        crate::api::auth::LoginRequest,
        crate::api::auth::ConnectionStatus,
        crate::api::auth::AuthResponse,
        crate::databases::DatabaseSafe,
        crate::api::databases::AddDatabaseRequest,
        crate::api::databases::SelectDatabaseRequest,
        crate::api::databases::DeleteDatabaseRequest,
        crate::api::databases::DatabaseListResponse,
        crate::api::databases::DatabaseAddedResponse,
        crate::api::databases::DatabaseSelectedResponse,
        crate::api::graph::NodeEntitiesRequest,
        crate::api::graph::RelationshipEntitiesRequest,
        crate::api::graph::DatabaseInfoResponse,
        crate::api::graph::NodeEntitiesResponse,
        crate::api::graph::RelationshipEntitiesResponse,
        smartd_core::DatabaseInfo,
        smartd_core::GraphNode,
        smartd_core::GraphRelationship,
    ))
)]
pub struct ApiDoc;
