use crate::core::{compile_filters, SearchError};
use crate::models::{
    FeatureCollection, GeoPoint, HealthResponse, SearchRequest, SearchResponse, SiteHit,
};
use crate::routes::{error_body, search_error_response, AppState};
use crate::services::{CacheKey, StoreError};
use actix_web::{http::StatusCode, web, HttpRequest, HttpResponse, Responder};
use validator::Validate;

/// Configure search-related routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .route("/search", web::post().to(search_json))
        .route("/search", web::get().to(search_form))
        .route("/search/geojson", web::get().to(search_geojson));
}

/// Health check endpoint
async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let store = state.engine.store();
    let healthy = store.health_check().await.unwrap_or(false);

    let status = if healthy { "healthy" } else { "degraded" };

    HttpResponse::Ok().json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        store: store.backend().to_string(),
        cached_searches: state.cache.as_ref().map_or(0, |cache| cache.stats().l1_size),
        timestamp: chrono::Utc::now(),
    })
}

/// Search endpoint
///
/// POST /api/v1/search
///
/// Request body:
/// ```json
/// {
///   "latitude": 45.75,
///   "longitude": 4.85,
///   "radius_km": 50,
///   "filters": {"materials": [1, 2], "origin": [3], "nemployees": [10, 250]}
/// }
/// ```
async fn search_json(state: web::Data<AppState>, req: web::Json<SearchRequest>) -> impl Responder {
    if let Err(errors) = req.validate() {
        tracing::info!("Validation failed for search request: {}", errors);
        return error_body(StatusCode::BAD_REQUEST, "validation_failed", errors.to_string());
    }

    match run_search(&state, &req).await {
        Ok(sites) => HttpResponse::Ok().json(SearchResponse::from(sites)),
        Err(e) => search_error_response(&e),
    }
}

/// Web-form search
///
/// GET /api/v1/search?lat=45.75&lon=4.85&radius=50&materials=1&materials=2&origin=
async fn search_form(state: web::Data<AppState>, http_req: HttpRequest) -> impl Responder {
    let req = match parse_form(&http_req) {
        Ok(req) => req,
        Err(response) => return response,
    };

    match run_search(&state, &req).await {
        Ok(sites) => HttpResponse::Ok().json(SearchResponse::from(sites)),
        Err(e) => search_error_response(&e),
    }
}

/// Same as the web-form search, rendered as a GeoJSON FeatureCollection for maps
///
/// GET /api/v1/search/geojson?lat=45.75&lon=4.85&radius=50
async fn search_geojson(state: web::Data<AppState>, http_req: HttpRequest) -> impl Responder {
    let req = match parse_form(&http_req) {
        Ok(req) => req,
        Err(response) => return response,
    };

    match run_search(&state, &req).await {
        Ok(sites) => HttpResponse::Ok()
            .content_type("application/geo+json")
            .json(FeatureCollection::from(sites.as_slice())),
        Err(e) => search_error_response(&e),
    }
}

fn parse_form(http_req: &HttpRequest) -> Result<SearchRequest, HttpResponse> {
    SearchRequest::from_query_string(http_req.query_string())
        .map_err(|message| error_body(StatusCode::BAD_REQUEST, "invalid_query", message))
}

/// Run a search through the result cache, bounded by the configured timeout
async fn run_search(state: &AppState, req: &SearchRequest) -> Result<Vec<SiteHit>, SearchError> {
    let center = GeoPoint::new(req.latitude, req.longitude);
    let filters = compile_filters(&req.filters)?;
    let key = CacheKey::search(center, req.radius_km, &filters);

    if let Some(cache) = &state.cache {
        if let Ok(sites) = cache.get::<Vec<SiteHit>>(&key).await {
            tracing::debug!("Serving cached search {}", key);
            return Ok(sites);
        }
    }

    let sites = tokio::time::timeout(
        state.search_timeout,
        state.engine.search(center, req.radius_km, &filters),
    )
    .await
    .map_err(|_| {
        tracing::warn!("Search timed out after {:?}", state.search_timeout);
        SearchError::StoreUnavailable(StoreError::Timeout(state.search_timeout))
    })??;

    if let Some(cache) = &state.cache {
        if let Err(e) = cache.set(&key, &sites).await {
            tracing::warn!("Failed to cache search results: {}", e);
        }
    }

    Ok(sites)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SearchEngine;
    use crate::models::{Enterprise, Site};
    use crate::services::{CacheManager, Catalog, InMemoryStore};
    use actix_web::{test, App};
    use std::sync::Arc;
    use std::time::Duration;

    fn state() -> AppState {
        let mut catalog = Catalog::new();
        catalog
            .insert_enterprise(Enterprise {
                id: 1,
                name: "Scierie du Lac".to_string(),
                website: String::new(),
                description: String::new(),
                n_employees: None,
                annual_sales: None,
                added: None,
                updated: None,
            })
            .unwrap();
        catalog
            .insert_site(Site {
                id: 10,
                enterprise_id: 1,
                text_version: "Annecy".to_string(),
                location: GeoPoint::new(45.9, 6.12),
                is_production: true,
            })
            .unwrap();
        let store = Arc::new(InMemoryStore::new(catalog));

        AppState {
            engine: SearchEngine::new(store.clone()).with_max_radius_km(500.0),
            catalog: store,
            cache: Some(Arc::new(CacheManager::in_memory(10, 60))),
            search_timeout: Duration::from_secs(5),
        }
    }

    #[actix_web::test]
    async fn test_form_search_returns_sites() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state()))
                .configure(crate::routes::configure_routes),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/api/v1/search?lat=45.9&lon=6.1&radius=10&materials=&origin=")
            .to_request();
        let body: SearchResponse = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body.total_results, 1);
        assert_eq!(body.sites[0].site.id, 10);
    }

    #[actix_web::test]
    async fn test_invalid_input_is_bad_request() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state()))
                .configure(crate::routes::configure_routes),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/api/v1/search?lat=45.9&lon=6.1&radius=900")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::get()
            .uri("/api/v1/search?lat=45.9&lon=6.1&radius=10&nemployees=1000&nemployees=10")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    /// A store too slow for any search budget
    struct SlowStore;

    #[async_trait::async_trait]
    impl crate::services::EntityStore for SlowStore {
        async fn sites_within_radius(
            &self,
            _center: GeoPoint,
            _radius_km: f64,
        ) -> Result<Vec<Site>, StoreError> {
            tokio::time::sleep(Duration::from_millis(500)).await;
            Ok(Vec::new())
        }

        async fn enterprises_with_offering(
            &self,
            _enterprise_ids: &[crate::models::EnterpriseId],
            _facet: crate::core::OfferingFacet,
            _values: &std::collections::BTreeSet<i64>,
        ) -> Result<std::collections::HashSet<crate::models::EnterpriseId>, StoreError> {
            Ok(Default::default())
        }

        async fn enterprise_bands(
            &self,
            _enterprise_ids: &[crate::models::EnterpriseId],
        ) -> Result<
            std::collections::HashMap<crate::models::EnterpriseId, crate::services::EnterpriseBands>,
            StoreError,
        > {
            Ok(Default::default())
        }

        fn backend(&self) -> &'static str {
            "slow"
        }
    }

    #[actix_web::test]
    async fn test_search_timeout_is_service_unavailable() {
        let state = AppState {
            engine: SearchEngine::new(Arc::new(SlowStore)),
            catalog: Arc::new(InMemoryStore::new(Catalog::new())),
            cache: None,
            search_timeout: Duration::from_millis(20),
        };
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(crate::routes::configure_routes),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/api/v1/search?lat=45.9&lon=6.1&radius=10")
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            resp.headers().get(actix_web::http::header::RETRY_AFTER).unwrap(),
            "1"
        );
    }

    #[actix_web::test]
    async fn test_json_search_and_geojson() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state()))
                .configure(crate::routes::configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/search")
            .set_json(serde_json::json!({
                "latitude": 45.9,
                "longitude": 6.12,
                "radius_km": 1,
                "filters": {"materials": [42]}
            }))
            .to_request();
        let body: SearchResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.total_results, 0);

        let req = test::TestRequest::get()
            .uri("/api/v1/search/geojson?lat=45.9&lon=6.12&radius=1")
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["type"], "FeatureCollection");
        assert_eq!(body["features"][0]["properties"]["text_version"], "Annecy");
    }
}
