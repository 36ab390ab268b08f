//! Reporting endpoints: the admin dashboard and the manager views.
//!
//! Managers see only projects they own; admins see everything. The split
//! lives in the queries here, not in the guards — both roles pass the
//! manager-or-admin guard for the manager views.

use std::collections::HashMap;

use axum::{extract::State, Extension, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use sqlx::FromRow;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::errors::AppError;
use crate::models::project::{Collaborator, Project};
use crate::models::user::{User, UserSummary, ROLE_ADMIN, ROLE_MANAGER, ROLE_USER};
use crate::state::AppState;

#[derive(Debug, Default, Serialize)]
struct CountsByRole {
    admin: i64,
    manager: i64,
    user: i64,
}

impl CountsByRole {
    /// Unknown roles count as plain users.
    fn from_rows(rows: Vec<(String, i64)>) -> Self {
        let mut counts = CountsByRole::default();
        for (role, count) in rows {
            match role.as_str() {
                ROLE_ADMIN => counts.admin += count,
                ROLE_MANAGER => counts.manager += count,
                _ => counts.user += count,
            }
        }
        counts
    }
}

#[derive(Debug, Serialize, FromRow)]
struct CreatorCount {
    username: String,
    count: i64,
}

#[derive(Debug, Serialize, FromRow)]
struct AssignedUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub projects_assigned: i64,
    pub last_assigned: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct ManagedProject {
    #[serde(flatten)]
    project: Project,
    collaborator_details: Vec<Collaborator>,
}

/// GET /admin/managed-projects (manager or admin)
///
/// Admins get every project; managers get the projects they own. Each row
/// carries its collaborator list.
pub async fn managed_projects(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<Value>, AppError> {
    let projects = fetch_managed_projects(&state, &current).await?;

    let ids: Vec<Uuid> = projects.iter().map(|p| p.id).collect();
    let collaborators = sqlx::query_as::<_, Collaborator>(
        "SELECT * FROM collaborators WHERE project_id = ANY($1) ORDER BY added_at",
    )
    .bind(&ids)
    .fetch_all(&state.db)
    .await?;

    let mut by_project: HashMap<Uuid, Vec<Collaborator>> = HashMap::new();
    for collaborator in collaborators {
        by_project
            .entry(collaborator.project_id)
            .or_default()
            .push(collaborator);
    }

    let projects: Vec<ManagedProject> = projects
        .into_iter()
        .map(|project| ManagedProject {
            collaborator_details: by_project.remove(&project.id).unwrap_or_default(),
            project,
        })
        .collect();

    Ok(Json(json!({ "projects": projects })))
}

/// GET /admin/assignable-users (manager or admin)
///
/// Plain users only — managers and admins are not assignable as collaborators.
pub async fn assignable_users(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let users = sqlx::query_as::<_, UserSummary>(
        r#"
        SELECT id, username, email, created_at FROM users
        WHERE role NOT IN ($1, $2)
        ORDER BY username
        "#,
    )
    .bind(ROLE_MANAGER)
    .bind(ROLE_ADMIN)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(json!({ "users": users })))
}

/// GET /admin/dashboard (admin only)
pub async fn dashboard(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let users_by_role = CountsByRole::from_rows(
        sqlx::query_as("SELECT role, COUNT(*) FROM users GROUP BY role")
            .fetch_all(&state.db)
            .await?,
    );

    let (total_users,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
        .fetch_one(&state.db)
        .await?;
    let (total_projects,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM projects")
        .fetch_one(&state.db)
        .await?;

    let top_creators = sqlx::query_as::<_, CreatorCount>(
        r#"
        SELECT owner AS username, COUNT(*) AS count
        FROM projects GROUP BY owner
        ORDER BY count DESC LIMIT 10
        "#,
    )
    .fetch_all(&state.db)
    .await?;

    let projects_by_creator_role = CountsByRole::from_rows(
        sqlx::query_as(
            r#"
            SELECT COALESCE(u.role, 'user') AS role, COUNT(*)
            FROM projects p
            LEFT JOIN users u ON u.username = p.owner
            GROUP BY 1
            "#,
        )
        .fetch_all(&state.db)
        .await?,
    );

    let manager_contributors = sqlx::query_as::<_, CreatorCount>(
        r#"
        SELECT u.username, COUNT(p.id) AS count
        FROM users u
        JOIN projects p ON p.owner = u.username
        WHERE u.role = $1
        GROUP BY u.username
        ORDER BY count DESC LIMIT 5
        "#,
    )
    .bind(ROLE_MANAGER)
    .fetch_all(&state.db)
    .await?;

    let recent_users = sqlx::query_as::<_, User>(
        "SELECT * FROM users ORDER BY created_at DESC LIMIT 5",
    )
    .fetch_all(&state.db)
    .await?;

    let recent_projects = sqlx::query_as::<_, Project>(
        "SELECT * FROM projects ORDER BY created_at DESC LIMIT 5",
    )
    .fetch_all(&state.db)
    .await?;

    let total_managers = users_by_role.manager;
    let projects_by_managers = projects_by_creator_role.manager;
    let average_projects_per_manager = if total_managers > 0 {
        (projects_by_managers as f64 / total_managers as f64 * 10.0).round() / 10.0
    } else {
        0.0
    };

    let manager_contributors: Vec<Value> = manager_contributors
        .into_iter()
        .map(|c| json!({ "username": c.username, "count": c.count, "role": ROLE_MANAGER }))
        .collect();

    Ok(Json(json!({
        "users_stats": {
            "total": total_users,
            "by_role": users_by_role,
        },
        "projects_stats": {
            "total": total_projects,
            "by_user": top_creators,
            "by_creator_role": projects_by_creator_role,
        },
        "manager_stats": {
            "total_managers": total_managers,
            "projects_by_managers": projects_by_managers,
            "average_projects_per_manager": average_projects_per_manager,
        },
        "manager_contributors": manager_contributors,
        "recent_users": recent_users,
        "recent_projects": recent_projects,
    })))
}

/// GET /admin/manager-dashboard (manager or admin)
pub async fn manager_dashboard(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<Value>, AppError> {
    let managed = fetch_managed_projects(&state, &current).await?;

    let (total_assigned_users,): (i64,) = if current.is_admin() {
        sqlx::query_as("SELECT COUNT(*) FROM users WHERE role = $1")
            .bind(ROLE_USER)
            .fetch_one(&state.db)
            .await?
    } else {
        sqlx::query_as(
            r#"
            SELECT COUNT(DISTINCT username) FROM collaborators
            WHERE project_id IN (SELECT id FROM projects WHERE owner = $1)
            "#,
        )
        .bind(&current.username)
        .fetch_one(&state.db)
        .await?
    };

    let recent_collaborators = if current.is_admin() {
        sqlx::query_as::<_, Collaborator>(
            "SELECT * FROM collaborators ORDER BY added_at DESC LIMIT 5",
        )
        .fetch_all(&state.db)
        .await?
    } else {
        sqlx::query_as::<_, Collaborator>(
            r#"
            SELECT * FROM collaborators
            WHERE project_id IN (SELECT id FROM projects WHERE owner = $1)
            ORDER BY added_at DESC LIMIT 5
            "#,
        )
        .bind(&current.username)
        .fetch_all(&state.db)
        .await?
    };

    let total = managed.len();
    let recent: Vec<&Project> = managed.iter().take(5).collect();

    Ok(Json(json!({
        "managed_projects": {
            "total": total,
            "projects": recent,
        },
        "assigned_users": {
            "total": total_assigned_users,
            "recent": recent_collaborators,
        },
        "recent_activity": {
            "projects_created": total,
            "users_assigned": recent_collaborators.len(),
        },
    })))
}

/// GET /admin/manager-users (manager or admin)
///
/// Users assigned as collaborators on the caller's managed projects, with
/// assignment counts and the most recent assignment time.
pub async fn manager_users(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<Value>, AppError> {
    let users = if current.is_admin() {
        sqlx::query_as::<_, AssignedUser>(
            r#"
            SELECT u.id, u.username, u.email, u.created_at,
                   COUNT(c.id) AS projects_assigned,
                   MAX(c.added_at) AS last_assigned
            FROM collaborators c
            JOIN users u ON u.username = c.username
            GROUP BY u.id
            ORDER BY last_assigned DESC
            "#,
        )
        .fetch_all(&state.db)
        .await?
    } else {
        sqlx::query_as::<_, AssignedUser>(
            r#"
            SELECT u.id, u.username, u.email, u.created_at,
                   COUNT(c.id) AS projects_assigned,
                   MAX(c.added_at) AS last_assigned
            FROM collaborators c
            JOIN users u ON u.username = c.username
            WHERE c.project_id IN (SELECT id FROM projects WHERE owner = $1)
            GROUP BY u.id
            ORDER BY last_assigned DESC
            "#,
        )
        .bind(&current.username)
        .fetch_all(&state.db)
        .await?
    };

    Ok(Json(json!({ "users": users })))
}

async fn fetch_managed_projects(
    state: &AppState,
    current: &CurrentUser,
) -> Result<Vec<Project>, AppError> {
    let projects = if current.is_admin() {
        sqlx::query_as::<_, Project>("SELECT * FROM projects ORDER BY created_at DESC")
            .fetch_all(&state.db)
            .await?
    } else {
        sqlx::query_as::<_, Project>(
            "SELECT * FROM projects WHERE owner = $1 ORDER BY created_at DESC",
        )
        .bind(&current.username)
        .fetch_all(&state.db)
        .await?
    };

    Ok(projects)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_by_role_folds_unknown_roles_into_user() {
        let counts = CountsByRole::from_rows(vec![
            ("admin".to_string(), 1),
            ("manager".to_string(), 2),
            ("user".to_string(), 3),
            ("intern".to_string(), 4),
        ]);
        assert_eq!(counts.admin, 1);
        assert_eq!(counts.manager, 2);
        assert_eq!(counts.user, 7);
    }
}
