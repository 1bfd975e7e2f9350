//! Intelligent interfaces: semantic search, speech, translation, OCR and image processing

use bytes::Bytes;

use super::{with_query, CONTENT_TYPE_JSON};
use crate::{Client, Error};

const API_SEMANTIC: &str = "/semantic/semproxy/search";
const API_ADD_VOICE_TO_RECO_FOR_TEXT: &str = "/cgi-bin/media/voice/addvoicetorecofortext";
const API_QUERY_RECO_RESULT_FOR_TEXT: &str = "/cgi-bin/media/voice/queryrecoresultfortext";
const API_TRANSLATE_CONTENT: &str = "/cgi-bin/media/voice/translatecontent";
const API_OCR_ID_CARD: &str = "/cv/ocr/idcard";
const API_OCR_BANKCARD: &str = "/cv/ocr/bankcard";
const API_OCR_DRIVING_LICENSE: &str = "/cv/ocr/drivinglicense";
const API_OCR_BIZ_LICENSE: &str = "/cv/ocr/bizlicense";
const API_OCR_COMMON: &str = "/cv/ocr/comm";
const API_QR_CODE: &str = "/cv/img/qrcode";
const API_SUPER_RESOLUTION: &str = "/cv/img/superresolution";
const API_AI_CROP: &str = "/cv/img/aicrop";

/// Semantic understanding of a user query
pub async fn semantic(client: &Client, payload: impl Into<Bytes>) -> Result<Bytes, Error> {
    client
        .http_post(API_SEMANTIC, payload, CONTENT_TYPE_JSON)
        .await
}

/// Submits voice data for recognition (`format`, `voice_id`, `lang`)
pub async fn add_voice_to_reco_for_text(
    client: &Client,
    payload: impl Into<Bytes>,
    params: &[(&str, &str)],
) -> Result<Bytes, Error> {
    let path = with_query(API_ADD_VOICE_TO_RECO_FOR_TEXT, params);
    client.http_post(&path, payload, CONTENT_TYPE_JSON).await
}

/// Fetches the result of a voice recognition (`voice_id`, `lang`)
pub async fn query_reco_result_for_text(
    client: &Client,
    payload: impl Into<Bytes>,
    params: &[(&str, &str)],
) -> Result<Bytes, Error> {
    let path = with_query(API_QUERY_RECO_RESULT_FOR_TEXT, params);
    client.http_post(&path, payload, CONTENT_TYPE_JSON).await
}

/// Translates text (`lfrom`, `lto`)
pub async fn translate_content(
    client: &Client,
    payload: impl Into<Bytes>,
    params: &[(&str, &str)],
) -> Result<Bytes, Error> {
    let path = with_query(API_TRANSLATE_CONTENT, params);
    client.http_post(&path, payload, CONTENT_TYPE_JSON).await
}

/// Recognizes an identity card
pub async fn ocr_id_card(client: &Client, payload: impl Into<Bytes>) -> Result<Bytes, Error> {
    client
        .http_post(API_OCR_ID_CARD, payload, CONTENT_TYPE_JSON)
        .await
}

/// Recognizes a bank card
pub async fn ocr_bankcard(client: &Client, payload: impl Into<Bytes>) -> Result<Bytes, Error> {
    client
        .http_post(API_OCR_BANKCARD, payload, CONTENT_TYPE_JSON)
        .await
}

/// Recognizes a driving or vehicle license
pub async fn ocr_driving_license(
    client: &Client,
    payload: impl Into<Bytes>,
) -> Result<Bytes, Error> {
    client
        .http_post(API_OCR_DRIVING_LICENSE, payload, CONTENT_TYPE_JSON)
        .await
}

/// Recognizes a business license
pub async fn ocr_biz_license(client: &Client, payload: impl Into<Bytes>) -> Result<Bytes, Error> {
    client
        .http_post(API_OCR_BIZ_LICENSE, payload, CONTENT_TYPE_JSON)
        .await
}

/// Recognizes printed text
pub async fn ocr_common(client: &Client, payload: impl Into<Bytes>) -> Result<Bytes, Error> {
    client
        .http_post(API_OCR_COMMON, payload, CONTENT_TYPE_JSON)
        .await
}

/// Decodes QR codes and barcodes
pub async fn qr_code(client: &Client, payload: impl Into<Bytes>) -> Result<Bytes, Error> {
    client
        .http_post(API_QR_CODE, payload, CONTENT_TYPE_JSON)
        .await
}

/// Upscales an image
pub async fn super_resolution(client: &Client, payload: impl Into<Bytes>) -> Result<Bytes, Error> {
    client
        .http_post(API_SUPER_RESOLUTION, payload, CONTENT_TYPE_JSON)
        .await
}

/// Suggests crops for an image
pub async fn ai_crop(client: &Client, payload: impl Into<Bytes>) -> Result<Bytes, Error> {
    client
        .http_post(API_AI_CROP, payload, CONTENT_TYPE_JSON)
        .await
}
