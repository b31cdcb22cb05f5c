use reportflow_core::{AppError, AppResult, PrincipalId, ProjectId};
use reportflow_domain::{
    AssignmentScope, PermissionKey, Principal, RoleAssignment, RoleCatalog, RoleLevel, RoleName,
    ScopeQualifier,
};
use reportflow_infrastructure::InMemoryPrincipalDirectory;
use tracing::info;
use uuid::Uuid;

const DEV_SEED_PROJECT_ID: &str = "11111111-1111-1111-1111-111111111111";
const DEV_SEED_COUNTRY: &str = "KE";

const DEV_SEED_GLOBAL_ADMIN_ID: &str = "5f1c2b74-a6c0-4a58-9be2-0d5f4f2a9e01";
const DEV_SEED_GLOBAL_ADMIN_TOKEN: &str = "dev-global-admin";
const DEV_SEED_COUNTRY_ADMIN_ID: &str = "9a4e8d12-3bf7-4c61-8e0a-7c2d9b5f3e02";
const DEV_SEED_COUNTRY_ADMIN_TOKEN: &str = "dev-country-admin";
const DEV_SEED_PROJECT_ADMIN_ID: &str = "c7b3f0a9-51d4-4e8f-b2c6-1a8e5d7f4b03";
const DEV_SEED_PROJECT_ADMIN_TOKEN: &str = "dev-project-admin";
const DEV_SEED_BRANCH_ADMIN_ID: &str = "e2d9c6b1-74af-4d03-a5e8-6f3b0c8d2a04";
const DEV_SEED_BRANCH_ADMIN_TOKEN: &str = "dev-branch-admin";
const DEV_SEED_AUDITOR_ID: &str = "b8a5e3d0-96c2-4f17-8d4b-3e7a1f9c6d05";
const DEV_SEED_AUDITOR_TOKEN: &str = "dev-field-auditor";
const DEV_SEED_AUDITOR_ROLE: &str = "field-auditor";
const DEV_SEED_AUDITOR_LEVEL: u8 = 6;

/// Registers a fixed set of principals behind well-known dev tokens.
///
/// Memory-store deployments have no external identity provider to lean on,
/// so the directory is populated at startup instead.
pub async fn run(directory: &InMemoryPrincipalDirectory, catalog: &RoleCatalog) -> AppResult<()> {
    let project_id = ProjectId::from_uuid(parse_uuid_const(
        DEV_SEED_PROJECT_ID,
        "DEV_SEED_PROJECT_ID",
    )?);

    let global_admin = Principal::new(
        principal_id(DEV_SEED_GLOBAL_ADMIN_ID, "DEV_SEED_GLOBAL_ADMIN_ID")?,
        "Dana Okafor",
    )
    .with_assignment(builtin_assignment(
        catalog,
        RoleName::GlobalAdmin,
        AssignmentScope::Global,
    )?);

    let country_admin = Principal::new(
        principal_id(DEV_SEED_COUNTRY_ADMIN_ID, "DEV_SEED_COUNTRY_ADMIN_ID")?,
        "Joseph Mwangi",
    )
    .with_assignment(builtin_assignment(
        catalog,
        RoleName::CountryAdmin,
        AssignmentScope::Regional {
            country: DEV_SEED_COUNTRY.to_owned(),
        },
    )?);

    let project_admin = Principal::new(
        principal_id(DEV_SEED_PROJECT_ADMIN_ID, "DEV_SEED_PROJECT_ADMIN_ID")?,
        "Amina Hassan",
    )
    .with_assignment(builtin_assignment(
        catalog,
        RoleName::ProjectAdmin,
        AssignmentScope::Project { project_id },
    )?);

    let branch_admin = Principal::new(
        principal_id(DEV_SEED_BRANCH_ADMIN_ID, "DEV_SEED_BRANCH_ADMIN_ID")?,
        "Elena Vasquez",
    )
    .with_assignment(builtin_assignment(
        catalog,
        RoleName::BranchAdmin,
        AssignmentScope::Project { project_id },
    )?);

    // Custom role with no presets; everything it may do comes from direct
    // grants.
    let auditor = Principal::new(
        principal_id(DEV_SEED_AUDITOR_ID, "DEV_SEED_AUDITOR_ID")?,
        "Miriam Osei",
    )
    .with_assignment(RoleAssignment::active(
        RoleName::Custom(DEV_SEED_AUDITOR_ROLE.to_owned()),
        RoleLevel::new(DEV_SEED_AUDITOR_LEVEL)?,
        AssignmentScope::Regional {
            country: DEV_SEED_COUNTRY.to_owned(),
        },
    ))
    .with_direct_permission(PermissionKey::qualified(
        "reports",
        "view",
        ScopeQualifier::Regional,
    )?)
    .with_direct_permission(PermissionKey::qualified(
        "reports",
        "export",
        ScopeQualifier::Regional,
    )?);

    directory
        .register(DEV_SEED_GLOBAL_ADMIN_TOKEN, global_admin)
        .await;
    directory
        .register(DEV_SEED_COUNTRY_ADMIN_TOKEN, country_admin)
        .await;
    directory
        .register(DEV_SEED_PROJECT_ADMIN_TOKEN, project_admin)
        .await;
    directory
        .register(DEV_SEED_BRANCH_ADMIN_TOKEN, branch_admin)
        .await;
    directory.register(DEV_SEED_AUDITOR_TOKEN, auditor).await;

    info!(
        project_id = %project_id,
        tokens = ?[
            DEV_SEED_GLOBAL_ADMIN_TOKEN,
            DEV_SEED_COUNTRY_ADMIN_TOKEN,
            DEV_SEED_PROJECT_ADMIN_TOKEN,
            DEV_SEED_BRANCH_ADMIN_TOKEN,
            DEV_SEED_AUDITOR_TOKEN,
        ],
        "development principal seed completed"
    );

    Ok(())
}

fn builtin_assignment(
    catalog: &RoleCatalog,
    role_name: RoleName,
    scope: AssignmentScope,
) -> AppResult<RoleAssignment> {
    let level = catalog.level_of(&role_name).ok_or_else(|| {
        AppError::Internal(format!("role '{role_name}' is missing from the catalog"))
    })?;

    Ok(RoleAssignment::active(role_name, level, scope))
}

fn principal_id(value: &str, name: &str) -> AppResult<PrincipalId> {
    Ok(PrincipalId::from_uuid(parse_uuid_const(value, name)?))
}

fn parse_uuid_const(value: &str, name: &str) -> AppResult<Uuid> {
    Uuid::parse_str(value).map_err(|error| {
        AppError::Internal(format!("invalid static uuid '{name}={value}': {error}"))
    })
}
