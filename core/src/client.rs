//! Per-verb convenience calls on `Dispatcher`.
//!
//! Every method here is a fixed `dispatch` with its method constant and the
//! dispatcher's default client. The `*_and_decode` forms decode the result
//! into `T` and return decode failures unchanged.

use serde::de::DeserializeOwned;

use crate::context::CallContext;
use crate::dispatcher::{Decodable, Dispatcher};
use crate::error::DispatchError;
use crate::http::{Headers, HttpMethod};
use crate::payload::Payload;

impl Dispatcher {
    pub async fn get(&self, ctx: &CallContext, url: &str) -> Result<Decodable, DispatchError> {
        self.dispatch(ctx, HttpMethod::Get, url, None, None).await
    }

    pub async fn get_with_header(
        &self,
        ctx: &CallContext,
        url: &str,
        headers: &Headers,
    ) -> Result<Decodable, DispatchError> {
        self.dispatch(ctx, HttpMethod::Get, url, None, Some(headers)).await
    }

    pub async fn get_and_decode<T: DeserializeOwned>(
        &self,
        ctx: &CallContext,
        url: &str,
    ) -> Result<T, DispatchError> {
        self.get(ctx, url).await?.decode().await
    }

    pub async fn get_with_header_and_decode<T: DeserializeOwned>(
        &self,
        ctx: &CallContext,
        url: &str,
        headers: &Headers,
    ) -> Result<T, DispatchError> {
        self.get_with_header(ctx, url, headers).await?.decode().await
    }

    pub async fn delete(&self, ctx: &CallContext, url: &str) -> Result<Decodable, DispatchError> {
        self.dispatch(ctx, HttpMethod::Delete, url, None, None).await
    }

    pub async fn delete_with_header(
        &self,
        ctx: &CallContext,
        url: &str,
        headers: &Headers,
    ) -> Result<Decodable, DispatchError> {
        self.dispatch(ctx, HttpMethod::Delete, url, None, Some(headers))
            .await
    }

    pub async fn delete_and_decode<T: DeserializeOwned>(
        &self,
        ctx: &CallContext,
        url: &str,
    ) -> Result<T, DispatchError> {
        self.delete(ctx, url).await?.decode().await
    }

    pub async fn delete_with_header_and_decode<T: DeserializeOwned>(
        &self,
        ctx: &CallContext,
        url: &str,
        headers: &Headers,
    ) -> Result<T, DispatchError> {
        self.delete_with_header(ctx, url, headers).await?.decode().await
    }

    pub async fn post(
        &self,
        ctx: &CallContext,
        url: &str,
        body: impl Into<Payload>,
    ) -> Result<Decodable, DispatchError> {
        self.send(ctx, HttpMethod::Post, url, body.into(), None).await
    }

    pub async fn post_with_header(
        &self,
        ctx: &CallContext,
        url: &str,
        body: impl Into<Payload>,
        headers: &Headers,
    ) -> Result<Decodable, DispatchError> {
        self.send(ctx, HttpMethod::Post, url, body.into(), Some(headers))
            .await
    }

    pub async fn post_and_decode<T: DeserializeOwned>(
        &self,
        ctx: &CallContext,
        url: &str,
        body: impl Into<Payload>,
    ) -> Result<T, DispatchError> {
        self.post(ctx, url, body).await?.decode().await
    }

    pub async fn post_with_header_and_decode<T: DeserializeOwned>(
        &self,
        ctx: &CallContext,
        url: &str,
        body: impl Into<Payload>,
        headers: &Headers,
    ) -> Result<T, DispatchError> {
        self.post_with_header(ctx, url, body, headers)
            .await?
            .decode()
            .await
    }

    pub async fn put(
        &self,
        ctx: &CallContext,
        url: &str,
        body: impl Into<Payload>,
    ) -> Result<Decodable, DispatchError> {
        self.send(ctx, HttpMethod::Put, url, body.into(), None).await
    }

    pub async fn put_with_header(
        &self,
        ctx: &CallContext,
        url: &str,
        body: impl Into<Payload>,
        headers: &Headers,
    ) -> Result<Decodable, DispatchError> {
        self.send(ctx, HttpMethod::Put, url, body.into(), Some(headers))
            .await
    }

    pub async fn put_and_decode<T: DeserializeOwned>(
        &self,
        ctx: &CallContext,
        url: &str,
        body: impl Into<Payload>,
    ) -> Result<T, DispatchError> {
        self.put(ctx, url, body).await?.decode().await
    }

    pub async fn put_with_header_and_decode<T: DeserializeOwned>(
        &self,
        ctx: &CallContext,
        url: &str,
        body: impl Into<Payload>,
        headers: &Headers,
    ) -> Result<T, DispatchError> {
        self.put_with_header(ctx, url, body, headers)
            .await?
            .decode()
            .await
    }

    pub async fn patch(
        &self,
        ctx: &CallContext,
        url: &str,
        body: impl Into<Payload>,
    ) -> Result<Decodable, DispatchError> {
        self.send(ctx, HttpMethod::Patch, url, body.into(), None).await
    }

    pub async fn patch_with_header(
        &self,
        ctx: &CallContext,
        url: &str,
        body: impl Into<Payload>,
        headers: &Headers,
    ) -> Result<Decodable, DispatchError> {
        self.send(ctx, HttpMethod::Patch, url, body.into(), Some(headers))
            .await
    }

    pub async fn patch_and_decode<T: DeserializeOwned>(
        &self,
        ctx: &CallContext,
        url: &str,
        body: impl Into<Payload>,
    ) -> Result<T, DispatchError> {
        self.patch(ctx, url, body).await?.decode().await
    }

    pub async fn patch_with_header_and_decode<T: DeserializeOwned>(
        &self,
        ctx: &CallContext,
        url: &str,
        body: impl Into<Payload>,
        headers: &Headers,
    ) -> Result<T, DispatchError> {
        self.patch_with_header(ctx, url, body, headers)
            .await?
            .decode()
            .await
    }

    async fn send(
        &self,
        ctx: &CallContext,
        method: HttpMethod,
        url: &str,
        body: Payload,
        headers: Option<&Headers>,
    ) -> Result<Decodable, DispatchError> {
        self.dispatch(ctx, method, url, Some(&body), headers).await
    }
}
