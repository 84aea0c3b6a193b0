pub mod assignments;
pub mod calc;
pub mod core;
pub mod courses;
pub mod grades;
pub mod sync;
pub mod weights;
