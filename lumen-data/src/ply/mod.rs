//! PLY point cloud reading and writing

mod point_cloud;
mod reader;
mod writer;

pub use point_cloud::BasicPointCloud;
pub use reader::{read_point_cloud, read_vertex_rows, VertexRow};
pub use writer::{write_point_cloud, write_vertex_rows};
