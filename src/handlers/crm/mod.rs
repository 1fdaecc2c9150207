// handlers/crm - every route under /api/crm
//
// All of these run behind JWT authentication and tenant resolution; each
// handler reads `TenantContext` from the request extensions and passes the
// tenant id straight to its service.

pub mod account_contacts;
pub mod accounts;
pub mod contacts;
pub mod custom_fields;
pub mod dashboard;
pub mod opportunities;
pub mod opportunity_contacts;
pub mod relationship_types;
pub mod relationships;
pub mod search;
pub mod stages;
pub mod tenant;
