pub mod at4px;
pub mod px;
