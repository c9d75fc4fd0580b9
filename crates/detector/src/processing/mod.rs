pub mod decode;
pub mod nms;
pub mod post;
