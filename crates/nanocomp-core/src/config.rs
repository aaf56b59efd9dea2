/// Attribute names the engine writes onto nodes.
///
/// The tree and every instance rendering into it must agree on these, so
/// hosts usually build one value and hand clones to both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrandConfig {
    /// Attribute the tree indexes for keyed lookup.
    pub key_attribute: String,
    /// Attribute holding the identity token of the owning instance.
    pub brand_attribute: String,
    /// Marker attribute present only on proxy nodes.
    pub proxy_attribute: String,
}

impl Default for BrandConfig {
    fn default() -> Self {
        Self {
            key_attribute: "id".to_owned(),
            brand_attribute: "data-nanocomponent".to_owned(),
            proxy_attribute: "data-proxy".to_owned(),
        }
    }
}
