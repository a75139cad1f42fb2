use color_eyre::{eyre::eyre, Result};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::config::{Credentials, Settings};
use crate::error::FetchError;

use super::api_types::ApiPostsResponse;
use super::types::Page;
use super::{MediaSource, PostSource};

/// The API refuses page numbers past this cap.
pub const PAGE_CAP: u32 = 750;

/// HTTP client for the posts API and its media host.
#[derive(Clone)]
pub struct PostsClient {
  http: reqwest::Client,
  base: Url,
  credentials: Option<Credentials>,
  limit: u32,
}

impl PostsClient {
  pub fn new(settings: &Settings) -> Result<Self> {
    let base = Url::parse(&settings.api_url)
      .map_err(|e| eyre!("Invalid api_url {}: {}", settings.api_url, e))?;

    // The API rejects requests without a descriptive user agent
    let http = reqwest::Client::builder()
      .user_agent(concat!(
        env!("CARGO_PKG_NAME"),
        "/",
        env!("CARGO_PKG_VERSION")
      ))
      .timeout(Duration::from_secs(30))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      http,
      base,
      credentials: settings.credentials(),
      limit: settings.page_limit.max(1),
    })
  }

  fn posts_url(&self, query: &str, page: u32) -> Result<Url, FetchError> {
    let mut url = self.base.join("posts.json")?;
    url
      .query_pairs_mut()
      .append_pair("tags", query)
      .append_pair("page", &page.to_string())
      .append_pair("limit", &self.limit.to_string());
    Ok(url)
  }

  async fn get(&self, url: Url, authenticated: bool) -> Result<Vec<u8>, FetchError> {
    let url_str = url.to_string();
    let mut request = self.http.get(url);
    if authenticated {
      if let Some(creds) = &self.credentials {
        request = request.basic_auth(&creds.username, Some(&creds.api_key));
      }
    }

    let response = request.send().await.map_err(|source| FetchError::Http {
      url: url_str.clone(),
      source,
    })?;

    let status = response.status();
    if !status.is_success() {
      return Err(FetchError::Status {
        status: status.as_u16(),
        url: url_str,
      });
    }

    let bytes = response
      .bytes()
      .await
      .map_err(|source| FetchError::Http {
        url: url_str,
        source,
      })?;
    Ok(bytes.to_vec())
  }
}

impl PostSource for PostsClient {
  async fn fetch_page(&self, query: &str, page: u32) -> Result<Page, FetchError> {
    let url = self.posts_url(query, page)?;
    debug!(%url, "fetching posts page");

    let body = self.get(url.clone(), true).await?;
    let response: ApiPostsResponse =
      serde_json::from_slice(&body).map_err(|source| FetchError::Decode {
        url: url.to_string(),
        source,
      })?;

    Ok(response.into_page(query, page, self.limit, PAGE_CAP))
  }
}

impl MediaSource for PostsClient {
  async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
    let url = Url::parse(url)?;
    // Credentials only go to the API host, never to the media host
    self.get(url, false).await
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_posts_url_encodes_query() {
    let settings = Settings {
      api_url: "https://api.example/".to_string(),
      page_limit: 20,
      ..Settings::default()
    };
    let client = PostsClient::new(&settings).unwrap();
    let url = client.posts_url("cat rating:s", 3).unwrap();
    assert_eq!(
      url.as_str(),
      "https://api.example/posts.json?tags=cat+rating%3As&page=3&limit=20"
    );
  }

  #[test]
  fn test_invalid_base_url_is_rejected() {
    let settings = Settings {
      api_url: "not a url".to_string(),
      ..Settings::default()
    };
    assert!(PostsClient::new(&settings).is_err());
  }
}
