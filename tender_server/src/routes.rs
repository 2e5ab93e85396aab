//! Request handler definitions
//!
//! Define each route and its handler here. Handlers that are more than a line or two MUST go into a separate
//! module. Keep this module neat and tidy 🙏
//!
//! Handlers are thin: extract the caller's identity, hand the request to the engine API, let the error mapping
//! in [`crate::errors`] translate anything that goes wrong. No business rules live here.
use actix_web::{get, post, web, HttpRequest, HttpResponse, Responder};
use log::*;
use tender_engine::{EngineError, EscrowApi, OfferFlowApi, SqliteDatabase};

use crate::{
    data_objects::{
        CreateNeedRequest,
        CreateOfferRequest,
        InitializePaymentRequest,
        JsonResponse,
        RefundPaymentRequest,
        RejectOfferRequest,
        ReleasePaymentRequest,
    },
    errors::ServerError,
    helpers::authenticated_user,
    sandbox::SandboxGateway,
};

type OffersApi = web::Data<OfferFlowApi<SqliteDatabase>>;
type PaymentsApi = web::Data<EscrowApi<SqliteDatabase, SandboxGateway>>;

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

// ----------------------------------------------   Needs   ----------------------------------------------------
#[post("/needs")]
pub async fn create_need(
    req: HttpRequest,
    body: web::Json<CreateNeedRequest>,
    api: OffersApi,
) -> Result<HttpResponse, ServerError> {
    let buyer_id = authenticated_user(&req)?;
    let need = api.create_need(body.into_inner().into_new_need(buyer_id)).await?;
    Ok(HttpResponse::Created().json(need))
}

#[get("/needs/{id}")]
pub async fn get_need(
    req: HttpRequest,
    path: web::Path<i64>,
    api: OffersApi,
) -> Result<HttpResponse, ServerError> {
    let _user = authenticated_user(&req)?;
    let need_id = path.into_inner();
    let need = api
        .need_by_id(need_id)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("Need #{need_id}")))?;
    Ok(HttpResponse::Ok().json(need))
}

#[get("/needs/{id}/offers")]
pub async fn offers_for_need(
    req: HttpRequest,
    path: web::Path<i64>,
    api: OffersApi,
) -> Result<HttpResponse, ServerError> {
    let _user = authenticated_user(&req)?;
    let offers = api.offers_for_need(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(offers))
}

// ----------------------------------------------   Offers  ----------------------------------------------------
#[post("/offers")]
pub async fn create_offer(
    req: HttpRequest,
    body: web::Json<CreateOfferRequest>,
    api: OffersApi,
) -> Result<HttpResponse, ServerError> {
    let provider_id = authenticated_user(&req)?;
    let offer = api.create_offer(body.into_inner().into_new_offer(provider_id)).await?;
    Ok(HttpResponse::Created().json(offer))
}

#[get("/offers/{id}")]
pub async fn get_offer(
    req: HttpRequest,
    path: web::Path<i64>,
    api: OffersApi,
) -> Result<HttpResponse, ServerError> {
    let _user = authenticated_user(&req)?;
    let offer_id = path.into_inner();
    let offer = api
        .offer_by_id(offer_id)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("Offer #{offer_id}")))?;
    Ok(HttpResponse::Ok().json(offer))
}

#[post("/offers/{id}/accept")]
pub async fn accept_offer(
    req: HttpRequest,
    path: web::Path<i64>,
    api: OffersApi,
) -> Result<HttpResponse, ServerError> {
    let buyer_id = authenticated_user(&req)?;
    let offer = api.accept_offer(path.into_inner(), buyer_id).await?;
    Ok(HttpResponse::Ok().json(offer))
}

#[post("/offers/{id}/reject")]
pub async fn reject_offer(
    req: HttpRequest,
    path: web::Path<i64>,
    body: web::Json<RejectOfferRequest>,
    api: OffersApi,
) -> Result<HttpResponse, ServerError> {
    let buyer_id = authenticated_user(&req)?;
    let offer = api.reject_offer(path.into_inner(), buyer_id, body.into_inner().reason).await?;
    Ok(HttpResponse::Ok().json(offer))
}

#[post("/offers/{id}/withdraw")]
pub async fn withdraw_offer(
    req: HttpRequest,
    path: web::Path<i64>,
    api: OffersApi,
) -> Result<HttpResponse, ServerError> {
    let provider_id = authenticated_user(&req)?;
    let offer = api.withdraw_offer(path.into_inner(), provider_id).await?;
    Ok(HttpResponse::Ok().json(offer))
}

// ---------------------------------------------   Payments  ---------------------------------------------------
#[post("/payments")]
pub async fn initialize_payment(
    req: HttpRequest,
    body: web::Json<InitializePaymentRequest>,
    api: PaymentsApi,
) -> Result<HttpResponse, ServerError> {
    let buyer_id = authenticated_user(&req)?;
    let body = body.into_inner();
    let result = api.initialize_payment(body.offer_id, buyer_id, body.payment_details()).await?;
    Ok(HttpResponse::Ok().json(result))
}

/// The gateway's asynchronous callback. No identity header here: the request originates from the payment
/// gateway, and the payload's correlation id is what ties it to a transaction.
#[post("/payments/callback")]
pub async fn payment_callback(body: String, api: PaymentsApi) -> Result<HttpResponse, ServerError> {
    trace!("💻️ Received gateway callback");
    let txn = api.handle_payment_callback(&body).await?;
    debug!("💻️ Gateway callback applied to transaction #{}", txn.id);
    Ok(HttpResponse::Ok().json(JsonResponse::success(format!("transaction #{} is {}", txn.id, txn.status))))
}

#[get("/payments/stats")]
pub async fn my_stats(req: HttpRequest, api: PaymentsApi) -> Result<HttpResponse, ServerError> {
    let user_id = authenticated_user(&req)?;
    let stats = api.user_transaction_stats(user_id).await?;
    Ok(HttpResponse::Ok().json(stats))
}

#[get("/payments/{id}")]
pub async fn get_payment(
    req: HttpRequest,
    path: web::Path<i64>,
    api: PaymentsApi,
) -> Result<HttpResponse, ServerError> {
    let user_id = authenticated_user(&req)?;
    let txn = api.transaction_for_user(path.into_inner(), user_id).await?;
    Ok(HttpResponse::Ok().json(txn))
}

#[post("/payments/{id}/release")]
pub async fn release_payment(
    req: HttpRequest,
    path: web::Path<i64>,
    body: web::Json<ReleasePaymentRequest>,
    api: PaymentsApi,
) -> Result<HttpResponse, ServerError> {
    let buyer_id = authenticated_user(&req)?;
    let txn = api.release_payment(path.into_inner(), buyer_id, body.into_inner().notes).await?;
    Ok(HttpResponse::Ok().json(txn))
}

#[post("/payments/{id}/refund")]
pub async fn refund_payment(
    req: HttpRequest,
    path: web::Path<i64>,
    body: web::Json<RefundPaymentRequest>,
    api: PaymentsApi,
) -> Result<HttpResponse, ServerError> {
    let buyer_id = authenticated_user(&req)?;
    let txn = api.refund_payment(path.into_inner(), buyer_id, &body.into_inner().reason).await?;
    Ok(HttpResponse::Ok().json(txn))
}
