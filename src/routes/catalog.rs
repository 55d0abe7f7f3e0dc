use crate::models::{
    band_choices, Band, EmployeeBand, EnterpriseDetail, EnterpriseId, RevenueBand,
    TaxonomyResponse,
};
use crate::routes::{error_body, AppState};
use crate::services::CacheKey;
use actix_web::{http::StatusCode, web, HttpResponse, Responder};
use serde::Serialize;

/// Configure enterprise page and search form routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/enterprises/{id}", web::get().to(get_enterprise))
        .route("/taxonomy", web::get().to(get_taxonomy));
}

/// Enterprise detail with band labels resolved for display
#[derive(Debug, Serialize)]
struct EnterprisePage {
    #[serde(flatten)]
    detail: EnterpriseDetail,
    n_employees_label: Option<&'static str>,
    annual_sales_label: Option<&'static str>,
}

/// Enterprise page data
///
/// GET /api/v1/enterprises/{id}
async fn get_enterprise(
    state: web::Data<AppState>,
    path: web::Path<EnterpriseId>,
) -> impl Responder {
    let enterprise_id = path.into_inner();

    match state.catalog.enterprise_detail(enterprise_id).await {
        Ok(Some(detail)) => {
            let page = EnterprisePage {
                n_employees_label: detail.enterprise.n_employees.map(EmployeeBand::label),
                annual_sales_label: detail.enterprise.annual_sales.map(RevenueBand::label),
                detail,
            };
            HttpResponse::Ok().json(page)
        }
        Ok(None) => error_body(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("No enterprise with id {}", enterprise_id),
        ),
        Err(e) => {
            tracing::error!("Failed to load enterprise {}: {}", enterprise_id, e);
            error_body(StatusCode::SERVICE_UNAVAILABLE, "store_unavailable", e.to_string())
        }
    }
}

/// Facet choices for search forms
///
/// GET /api/v1/taxonomy
async fn get_taxonomy(state: web::Data<AppState>) -> impl Responder {
    let key = CacheKey::taxonomy();
    if let Some(cache) = &state.cache {
        if let Ok(response) = cache.get::<TaxonomyResponse>(&key).await {
            return HttpResponse::Ok().json(response);
        }
    }

    let taxonomy = match state.catalog.material_taxonomy().await {
        Ok(taxonomy) => taxonomy,
        Err(e) => {
            tracing::error!("Failed to load material taxonomy: {}", e);
            return error_body(StatusCode::SERVICE_UNAVAILABLE, "store_unavailable", e.to_string());
        }
    };

    let response = TaxonomyResponse {
        taxonomy,
        employee_bands: band_choices::<EmployeeBand>(),
        sales_bands: band_choices::<RevenueBand>(),
    };

    if let Some(cache) = &state.cache {
        if let Err(e) = cache.set(&key, &response).await {
            tracing::warn!("Failed to cache taxonomy: {}", e);
        }
    }

    HttpResponse::Ok().json(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SearchEngine;
    use crate::models::{Enterprise, MaterialType, MaterialTypeCategory};
    use crate::services::{Catalog, InMemoryStore};
    use actix_web::{test, App};
    use std::sync::Arc;
    use std::time::Duration;

    fn state() -> AppState {
        let mut catalog = Catalog::new();
        catalog
            .insert_category(MaterialTypeCategory { id: 1, name: "Isolation".into(), order: 2 })
            .unwrap();
        catalog
            .insert_material_type(MaterialType { id: 5, category_id: Some(1), name: "Panneaux".into(), order: 1 })
            .unwrap();
        catalog
            .insert_enterprise(Enterprise {
                id: 3,
                name: "Chanvre & Co".into(),
                website: "https://chanvre.example".into(),
                description: String::new(),
                n_employees: Some(EmployeeBand::Medium),
                annual_sales: None,
                added: None,
                updated: None,
            })
            .unwrap();
        let store = Arc::new(InMemoryStore::new(catalog));

        AppState {
            engine: SearchEngine::new(store.clone()),
            catalog: store,
            cache: None,
            search_timeout: Duration::from_secs(1),
        }
    }

    #[actix_web::test]
    async fn test_enterprise_page() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state()))
                .configure(crate::routes::configure_routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/v1/enterprises/3").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["enterprise"]["name"], "Chanvre & Co");
        assert_eq!(body["n_employees_label"], "50 à 249 salariés");
        assert!(body["annual_sales_label"].is_null());

        let req = test::TestRequest::get().uri("/api/v1/enterprises/99999").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_taxonomy_lists_bands() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state()))
                .configure(crate::routes::configure_routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/v1/taxonomy").to_request();
        let body: TaxonomyResponse = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body.taxonomy.categories[0].types[0].name, "Panneaux");
        assert_eq!(body.employee_bands.len(), EmployeeBand::ALL.len());
        assert_eq!(body.sales_bands[0].code, 1);
    }
}
