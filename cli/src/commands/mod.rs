pub mod delay;
pub mod diary;
pub mod health;
pub mod jobs;
