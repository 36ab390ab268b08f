// Administrative surface: cross-user management and reporting.
// Route guards (admin vs manager-or-admin) are applied in the router;
// handlers here assume the caller already passed the relevant guard.

pub mod projects;
pub mod reports;
pub mod users;
