use serde::Serialize;
use utoipa::ToSchema;

use plugin_core::PluginInfo;

#[derive(Debug, Serialize, ToSchema)]
pub struct PluginListResponse {
    #[schema(value_type = Vec<Object>)]
    pub plugins: Vec<PluginInfo>,
}
