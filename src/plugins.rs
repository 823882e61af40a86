//! Domain plugins: product lookup, order lookup, and policy search
//!
//! Each plugin adapts an external collaborator (catalog, order store, search
//! index) into the uniform [`Tool`](crate::tool::Tool) contract. The plugin
//! owns nothing but an `Arc` to its collaborator; results and failures are
//! both JSON-serializable values so the invoking agent can react to either.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::BoxError;
use crate::tool::{typed_tool, Tool, ToolError};

fn default_search_top() -> usize {
    5
}

fn default_policy_top() -> usize {
    3
}

// Long marketing copy gets trimmed before it reaches the model context.
const MAX_DESCRIPTION_LEN: usize = 240;

/// A product as returned by the catalog collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub sku: String,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub inventory: i64,
}

/// An order as returned by the order-store collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub customer_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub price: f64,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A hit from the policy/reference search index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyHit {
    pub title: String,
    pub content: String,
}

/// Product catalog collaborator (keyword and SKU lookup).
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Product>, BoxError>;
    async fn find_by_sku(&self, sku: &str) -> Result<Option<Product>, BoxError>;
}

/// Order store collaborator (lookup by id, filtered search, per-customer listing).
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn get_by_id(&self, order_id: &str) -> Result<Option<Order>, BoxError>;
    async fn search(
        &self,
        product_id: Option<&str>,
        description: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Order>, BoxError>;
    async fn list_for_customer(
        &self,
        customer_id: &str,
        limit: usize,
    ) -> Result<Vec<Order>, BoxError>;
}

/// Policy/reference search collaborator.
#[async_trait]
pub trait PolicyIndex: Send + Sync {
    async fn search(&self, query: &str, top: usize) -> Result<Vec<PolicyHit>, BoxError>;
}

#[derive(Debug, Deserialize, JsonSchema)]
struct SearchProductsArgs {
    /// Free-text query: name, description keywords, color, mood words
    query: String,
    #[serde(default = "default_search_top")]
    top: usize,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct GetProductBySkuArgs {
    sku: String,
}

/// Tools over the product catalog: keyword search and SKU lookup.
pub fn product_tools(catalog: Arc<dyn ProductCatalog>) -> Vec<Arc<dyn Tool>> {
    let search_catalog = catalog.clone();
    let search = typed_tool(
        "search_products",
        "Search products by name, description, or keywords",
        move |args: SearchProductsArgs| {
            let catalog = search_catalog.clone();
            async move {
                let items = catalog
                    .search(&args.query, args.top)
                    .await
                    .map_err(|e| ToolError::collaborator(format!("failed to search products: {}", e)))?;
                let trimmed: Vec<Product> = items.into_iter().map(trim_description).collect();
                Ok(serde_json::to_value(trimmed).unwrap_or_default())
            }
        },
    );

    let sku = typed_tool(
        "get_product_by_sku",
        "Look up a single product by its SKU",
        move |args: GetProductBySkuArgs| {
            let catalog = catalog.clone();
            async move {
                let found = catalog
                    .find_by_sku(&args.sku)
                    .await
                    .map_err(|e| ToolError::collaborator(format!("failed to lookup product: {}", e)))?;
                match found {
                    Some(product) => {
                        Ok(serde_json::to_value(trim_description(product)).unwrap_or_default())
                    }
                    None => Ok(serde_json::json!({
                        "message": format!("No product found for SKU {}", args.sku)
                    })),
                }
            }
        },
    );

    vec![search, sku]
}

fn trim_description(mut product: Product) -> Product {
    if product.description.len() > MAX_DESCRIPTION_LEN {
        let mut cut = MAX_DESCRIPTION_LEN;
        while !product.description.is_char_boundary(cut) {
            cut -= 1;
        }
        product.description.truncate(cut);
        product.description.push_str("...");
    }
    product
}

#[derive(Debug, Deserialize, JsonSchema)]
struct CheckOrderStatusArgs {
    order_id: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct SearchOrdersArgs {
    #[serde(default)]
    product_id: Option<String>,
    /// Description keywords to match against order line items
    #[serde(default)]
    description: Option<String>,
    #[serde(default = "default_search_top")]
    top: usize,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct ListRecentOrdersArgs {
    customer_id: String,
    #[serde(default = "default_search_top")]
    top: usize,
}

/// Tools over the order store: direct lookup, filtered search, recent orders.
pub fn order_tools(store: Arc<dyn OrderStore>) -> Vec<Arc<dyn Tool>> {
    let status_store = store.clone();
    let check_status = typed_tool(
        "check_order_status",
        "Look up an order by id and return its status",
        move |args: CheckOrderStatusArgs| {
            let store = status_store.clone();
            async move {
                let found = store
                    .get_by_id(&args.order_id)
                    .await
                    .map_err(|e| {
                        ToolError::collaborator(format!(
                            "failed to query order {}: {}",
                            args.order_id, e
                        ))
                    })?;
                match found {
                    Some(order) => Ok(serde_json::to_value(order).unwrap_or_default()),
                    None => Ok(serde_json::json!({
                        "message": format!("No order found for id {}", args.order_id)
                    })),
                }
            }
        },
    );

    let search_store = store.clone();
    let search = typed_tool(
        "search_orders",
        "Search orders by product id or description keywords",
        move |args: SearchOrdersArgs| {
            let store = search_store.clone();
            async move {
                let items = store
                    .search(args.product_id.as_deref(), args.description.as_deref(), args.top)
                    .await
                    .map_err(|e| ToolError::collaborator(format!("failed to search orders: {}", e)))?;
                Ok(serde_json::to_value(items).unwrap_or_default())
            }
        },
    );

    let recent = typed_tool(
        "list_recent_orders",
        "List recent orders for a customer",
        move |args: ListRecentOrdersArgs| {
            let store = store.clone();
            async move {
                let items = store
                    .list_for_customer(&args.customer_id, args.top)
                    .await
                    .map_err(|e| ToolError::collaborator(format!("failed to list orders: {}", e)))?;
                Ok(serde_json::to_value(items).unwrap_or_default())
            }
        },
    );

    vec![check_status, search, recent]
}

#[derive(Debug, Deserialize, JsonSchema)]
struct SearchPoliciesArgs {
    query: String,
    #[serde(default = "default_policy_top")]
    top: usize,
}

/// Tool over the policy/reference index.
pub fn policy_tools(index: Arc<dyn PolicyIndex>) -> Vec<Arc<dyn Tool>> {
    let search = typed_tool(
        "search_policies",
        "Search return, warranty, shipping, and support policies",
        move |args: SearchPoliciesArgs| {
            let index = index.clone();
            async move {
                let hits = index
                    .search(&args.query, args.top)
                    .await
                    .map_err(|e| {
                        ToolError::collaborator(format!("failed to search reference info: {}", e))
                    })?;
                Ok(serde_json::to_value(hits).unwrap_or_default())
            }
        },
    );
    vec![search]
}

/// In-memory product catalog for local runs and tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProductCatalog {
    products: Vec<Product>,
}

impl InMemoryProductCatalog {
    pub fn new(products: Vec<Product>) -> Self {
        Self { products }
    }
}

#[async_trait]
impl ProductCatalog for InMemoryProductCatalog {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Product>, BoxError> {
        let needle = query.to_lowercase();
        Ok(self
            .products
            .iter()
            .filter(|p| {
                p.name.to_lowercase().contains(&needle)
                    || p.description.to_lowercase().contains(&needle)
            })
            .take(limit)
            .cloned()
            .collect())
    }

    async fn find_by_sku(&self, sku: &str) -> Result<Option<Product>, BoxError> {
        Ok(self
            .products
            .iter()
            .find(|p| p.sku.eq_ignore_ascii_case(sku))
            .cloned())
    }
}

/// In-memory order store for local runs and tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOrderStore {
    orders: Vec<Order>,
}

impl InMemoryOrderStore {
    pub fn new(orders: Vec<Order>) -> Self {
        Self { orders }
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn get_by_id(&self, order_id: &str) -> Result<Option<Order>, BoxError> {
        Ok(self.orders.iter().find(|o| o.id == order_id).cloned())
    }

    async fn search(
        &self,
        product_id: Option<&str>,
        description: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Order>, BoxError> {
        let needle = description.map(|d| d.to_lowercase());
        Ok(self
            .orders
            .iter()
            .filter(|o| product_id.map_or(true, |pid| o.product_id == pid))
            .filter(|o| {
                needle.as_ref().map_or(true, |n| {
                    o.description
                        .as_ref()
                        .map_or(false, |d| d.to_lowercase().contains(n))
                })
            })
            .take(limit)
            .cloned()
            .collect())
    }

    async fn list_for_customer(
        &self,
        customer_id: &str,
        limit: usize,
    ) -> Result<Vec<Order>, BoxError> {
        Ok(self
            .orders
            .iter()
            .filter(|o| o.customer_id == customer_id)
            .take(limit)
            .cloned()
            .collect())
    }
}

/// In-memory policy index for local runs and tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPolicyIndex {
    entries: Vec<PolicyHit>,
}

impl InMemoryPolicyIndex {
    pub fn new(entries: Vec<PolicyHit>) -> Self {
        Self { entries }
    }
}

#[async_trait]
impl PolicyIndex for InMemoryPolicyIndex {
    async fn search(&self, query: &str, top: usize) -> Result<Vec<PolicyHit>, BoxError> {
        let needle = query.to_lowercase();
        Ok(self
            .entries
            .iter()
            .filter(|e| {
                e.title.to_lowercase().contains(&needle)
                    || e.content.to_lowercase().contains(&needle)
            })
            .take(top)
            .cloned()
            .collect())
    }
}
