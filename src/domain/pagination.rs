use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PaymentListParams {
    #[serde(default = "default_page")]
    #[validate(range(min = 1))]
    pub page: i64,
    #[serde(default = "default_limit")]
    #[validate(range(min = 1, max = 100))]
    pub limit: i64,
    #[serde(default)]
    pub sort_column: SortColumn,
    #[serde(default)]
    pub sort_order: SortOrder,
}

fn default_page() -> i64 {
    1
}

fn default_limit() -> i64 {
    10
}

impl Default for PaymentListParams {
    fn default() -> Self {
        Self {
            page: default_page(),
            limit: default_limit(),
            sort_column: SortColumn::default(),
            sort_order: SortOrder::default(),
        }
    }
}

impl PaymentListParams {
    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.limit
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortColumn {
    Id,
    OrderId,
    Amount,
    Status,
    #[default]
    CreatedAt,
    UpdatedAt,
    ExpiredAt,
    PaidAt,
}

impl SortColumn {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortColumn::Id => "id",
            SortColumn::OrderId => "order_id",
            SortColumn::Amount => "amount",
            SortColumn::Status => "status",
            SortColumn::CreatedAt => "created_at",
            SortColumn::UpdatedAt => "updated_at",
            SortColumn::ExpiredAt => "expired_at",
            SortColumn::PaidAt => "paid_at",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PaginationResult<T> {
    pub count: i64,
    pub total_page: i64,
    pub current_page: i64,
    pub next_page: Option<i64>,
    pub previous_page: Option<i64>,
    pub limit: i64,
    pub data: Vec<T>,
}

impl<T> PaginationResult<T> {
    pub fn new(page: i64, limit: i64, count: i64, data: Vec<T>) -> Self {
        let total_page = if count == 0 { 0 } else { (count + limit - 1) / limit };
        Self {
            count,
            total_page,
            current_page: page,
            next_page: (page < total_page).then_some(page + 1),
            previous_page: (page > 1).then_some(page - 1),
            limit,
            data,
        }
    }
}
