use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Tenant {authenticated_tenant_id} may not access a resource of tenant {resource_tenant_id}")]
pub struct TenantAccessDenied {
    pub authenticated_tenant_id: i64,
    pub resource_tenant_id: i64,
}

/// The single ownership check every tenant-scoped handler goes through
pub fn ensure_tenant_access(authenticated_tenant_id: i64, resource_tenant_id: i64) -> Result<(), TenantAccessDenied> {
    if authenticated_tenant_id == resource_tenant_id {
        return Ok(());
    }
    tracing::warn!(authenticated_tenant_id, resource_tenant_id, "Cross-tenant access attempt");
    Err(TenantAccessDenied {
        authenticated_tenant_id,
        resource_tenant_id,
    })
}
