use super::user::User;

/// Users submitted together in one message lookup.
pub type Batch = Vec<User>;

pub type ReportLine = String;
