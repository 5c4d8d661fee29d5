pub mod connected_components;
pub mod luma_frame;
pub mod morphology;
pub mod motion_mask;
pub mod region;
