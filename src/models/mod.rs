pub mod combined_group;
pub mod course;
pub mod enroll_group;
pub mod import_run;
pub mod instructor;
pub mod meeting;
pub mod section;
pub mod subject;

pub use combined_group::CombinedGroup;
pub use course::Course;
pub use enroll_group::EnrollGroup;
pub use import_run::ImportRun;
pub use instructor::Instructor;
pub use meeting::Meeting;
pub use section::{ClassSection, OpenStatus};
pub use subject::Subject;
