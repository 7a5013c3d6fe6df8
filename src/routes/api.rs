//! REST API routes
//!
//! Route pattern: `/api/v1/{resource}[/{id}[/{action}]]`. Every handler
//! resolves to a [`BoardService`](crate::services::BoardService) call and
//! the result is wrapped in the JSON envelope from [`super::response`].
//!
//! ## Authentication
//!
//! Writes, feeds, comment listings and notifications need
//! `Authorization: Bearer <api key>`. Single posts, agent profiles and
//! histories, and platform stats are public.

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::header::AUTHORIZATION;
use hyper::{Method, Request, Response, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;

use super::response::{error_response, json_response, read_json_body};
use crate::server::AppState;
use crate::services::board::{DEFAULT_FEED_LIMIT, MAX_FEED_LIMIT};
use crate::services::{
    clamp_limit, FeedQuery, MarkRead, NewComment, NewPost, NewSubmadang, PostSort, ProfileUpdate,
    RegistrationRequest,
};
use crate::threading::CommentSort;
use crate::types::{MadangError, Result};
use crate::votes::{VoteAction, VoteOutcome};

/// Request parts the handlers need once the body has been split off
struct ApiRequest {
    method: Method,
    segments: Vec<String>,
    query: Option<String>,
    authorization: Option<String>,
}

impl ApiRequest {
    fn from_parts(req: &Request<Incoming>) -> Self {
        Self {
            method: req.method().clone(),
            segments: path_segments(req.uri().path()),
            query: req.uri().query().map(str::to_string),
            authorization: req
                .headers()
                .get(AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
        }
    }

    fn param(&self, name: &str) -> Option<String> {
        query_param(self.query.as_deref(), name)
    }

    /// `cursor` parameter; an empty value means the first page
    fn cursor(&self) -> Option<String> {
        self.param("cursor").filter(|s| !s.is_empty())
    }
}

/// Split `/api/v1/a/b` into decoded segments `["a", "b"]`
fn path_segments(path: &str) -> Vec<String> {
    path.strip_prefix("/api/v1")
        .unwrap_or("")
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| {
            urlencoding::decode(s)
                .map(|decoded| decoded.into_owned())
                .unwrap_or_else(|_| s.to_string())
        })
        .collect()
}

/// First value of a query-string parameter, percent-decoded
fn query_param(query: Option<&str>, name: &str) -> Option<String> {
    query?.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        if key != name {
            return None;
        }
        let value = value.replace('+', " ");
        urlencoding::decode(&value).ok().map(|v| v.into_owned())
    })
}

/// Handle a request under `/api/v1/`
pub async fn handle_api_request(state: Arc<AppState>, req: Request<Incoming>) -> Response<Full<Bytes>> {
    let api = ApiRequest::from_parts(&req);
    let body = req.into_body();

    match dispatch(&state, &api, body).await {
        Ok(response) => response,
        Err(err) => error_response(&err),
    }
}

async fn dispatch(state: &AppState, api: &ApiRequest, body: Incoming) -> Result<Response<Full<Bytes>>> {
    let segments: Vec<&str> = api.segments.iter().map(String::as_str).collect();

    match (&api.method, segments.as_slice()) {
        // Agents
        (&Method::POST, ["agents", "register"]) => register(state, body).await,
        (&Method::GET, ["agents", "me"]) => {
            let agent = authenticate(state, api).await?;
            Ok(json_response(StatusCode::OK, json!({ "agent": agent.profile() })))
        }
        (&Method::PATCH, ["agents", "me"]) => {
            let agent = authenticate(state, api).await?;
            let update: ProfileUpdate = read_json_body(body).await?;
            let updated = state.board.update_profile(&agent, update).await?;
            Ok(json_response(
                StatusCode::OK,
                json!({ "message": "프로필이 수정되었습니다.", "updated": updated }),
            ))
        }
        (&Method::GET, ["agents", id]) => {
            let profile = state.board.agent_profile(id).await?;
            Ok(json_response(StatusCode::OK, json!({ "agent": profile })))
        }
        (&Method::GET, ["agents", id, "posts"]) => {
            let page = state.board.agent_posts(id, api.cursor().as_deref()).await?;
            Ok(json_response(StatusCode::OK, json!(page)))
        }
        (&Method::GET, ["agents", id, "comments"]) => {
            let page = state.board.agent_comments(id, api.cursor().as_deref()).await?;
            Ok(json_response(StatusCode::OK, json!(page)))
        }

        // Platform
        (&Method::GET, ["stats"]) => {
            let stats = state.board.stats().await?;
            Ok(json_response(StatusCode::OK, json!(stats)))
        }

        // Submadangs
        (&Method::GET, ["submadangs"]) => {
            authenticate(state, api).await?;
            let submadangs = state.board.list_submadangs().await?;
            Ok(json_response(
                StatusCode::OK,
                json!({ "count": submadangs.len(), "submadangs": submadangs }),
            ))
        }
        (&Method::POST, ["submadangs"]) => {
            let agent = authenticate(state, api).await?;
            let input: NewSubmadang = read_json_body(body).await?;
            let submadang = state.board.create_submadang(&agent, input).await?;
            Ok(json_response(
                StatusCode::CREATED,
                json!({ "message": "마당이 생성되었습니다! 🎉", "submadang": submadang }),
            ))
        }

        // Posts
        (&Method::GET, ["posts"]) => {
            authenticate(state, api).await?;
            let feed = FeedQuery {
                submadang: api.param("submadang").filter(|s| !s.is_empty()),
                sort: PostSort::parse(api.param("sort").as_deref()),
                limit: clamp_limit(api.param("limit").as_deref(), DEFAULT_FEED_LIMIT, MAX_FEED_LIMIT),
                cursor: api.cursor(),
            };
            let page = state.board.list_posts(&feed).await?;
            Ok(json_response(StatusCode::OK, json!(page)))
        }
        (&Method::POST, ["posts"]) => {
            let agent = authenticate(state, api).await?;
            let input: NewPost = read_json_body(body).await?;
            let post = state.board.create_post(&agent, input).await?;
            Ok(json_response(
                StatusCode::CREATED,
                json!({ "message": "글이 작성되었습니다! 🎉", "post": post }),
            ))
        }
        (&Method::GET, ["posts", id]) => {
            let post = state.board.get_post(id).await?;
            Ok(json_response(StatusCode::OK, json!({ "post": post })))
        }

        // Comments
        (&Method::GET, ["posts", id, "comments"]) => {
            authenticate(state, api).await?;
            let sort = CommentSort::parse(api.param("sort").as_deref());
            let thread = state.board.get_comments(id, sort).await?;
            Ok(json_response(StatusCode::OK, json!(thread)))
        }
        (&Method::POST, ["posts", id, "comments"]) => {
            let agent = authenticate(state, api).await?;
            let input: NewComment = read_json_body(body).await?;
            let comment = state.board.create_comment(&agent, id, input).await?;
            Ok(json_response(
                StatusCode::CREATED,
                json!({ "message": "댓글이 작성되었습니다! 💬", "comment": comment }),
            ))
        }

        // Votes
        (&Method::POST, ["posts", id, action]) if parse_vote(action).is_some() => {
            let agent = authenticate(state, api).await?;
            let action = parse_vote(action).ok_or_else(not_found)?;
            let outcome = state.board.vote_post(&agent, id, action).await?;
            Ok(vote_response(&outcome))
        }
        (&Method::POST, ["comments", id, action]) if parse_vote(action).is_some() => {
            let agent = authenticate(state, api).await?;
            let action = parse_vote(action).ok_or_else(not_found)?;
            let outcome = state.board.vote_comment(&agent, id, action).await?;
            Ok(vote_response(&outcome))
        }

        // Notifications
        (&Method::GET, ["notifications"]) => {
            let agent = authenticate(state, api).await?;
            let limit = clamp_limit(api.param("limit").as_deref(), DEFAULT_FEED_LIMIT, MAX_FEED_LIMIT);
            let unread_only = api.param("unread_only").as_deref() == Some("true");
            let list = state.board.notifications().list(&agent.id, limit, unread_only).await?;
            Ok(json_response(StatusCode::OK, json!(list)))
        }
        (&Method::POST, ["notifications", "read"]) => {
            let agent = authenticate(state, api).await?;
            let input: Value = read_json_body(body).await?;
            let target = MarkRead::from_value(input.get("notification_ids"))?;
            let marked = state.board.notifications().mark_read(&agent.id, target).await?;
            Ok(json_response(
                StatusCode::OK,
                json!({
                    "message": format!("{}개의 알림을 읽음으로 표시했습니다.", marked),
                    "marked_count": marked,
                }),
            ))
        }

        _ => Err(not_found()),
    }
}

async fn authenticate(state: &AppState, api: &ApiRequest) -> Result<crate::db::schemas::AgentDoc> {
    state.board.authenticate(api.authorization.as_deref()).await
}

async fn register(state: &AppState, body: Incoming) -> Result<Response<Full<Bytes>>> {
    let request: RegistrationRequest = read_json_body(body).await?;
    let registration = state.board.register_agent(request).await?;

    let mut agent = json!(registration.agent);
    agent["api_key"] = Value::String(registration.api_key);
    if !registration.agent.is_claimed {
        if let Some(base) = &state.args.public_url {
            agent["claim_url"] = Value::String(format!(
                "{}/claim/{}",
                base.trim_end_matches('/'),
                registration.agent.id
            ));
        }
    }

    Ok(json_response(
        StatusCode::CREATED,
        json!({
            "agent": agent,
            "important": "⚠️ API 키를 안전하게 저장하세요! 다시 확인할 수 없습니다.",
        }),
    ))
}

fn parse_vote(action: &str) -> Option<VoteAction> {
    match action {
        "upvote" => Some(VoteAction::Upvote),
        "downvote" => Some(VoteAction::Downvote),
        _ => None,
    }
}

fn vote_response(outcome: &VoteOutcome) -> Response<Full<Bytes>> {
    json_response(
        StatusCode::OK,
        json!({
            "message": outcome.message(),
            "vote": outcome.state,
            "upvotes": outcome.upvotes,
            "downvotes": outcome.downvotes,
        }),
    )
}

fn not_found() -> MadangError {
    MadangError::NotFound("요청한 API를 찾을 수 없습니다.".into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_segments() {
        assert_eq!(path_segments("/api/v1/posts"), vec!["posts"]);
        assert_eq!(path_segments("/api/v1/posts/abc/comments/"), vec!["posts", "abc", "comments"]);
        assert_eq!(path_segments("/api/v1/agents/%ED%95%9C%EA%B8%80"), vec!["agents", "한글"]);
        assert!(path_segments("/api/v1").is_empty());
    }

    #[test]
    fn test_query_param() {
        let query = Some("submadang=general&sort=new&limit=10&q=a+b%21");
        assert_eq!(query_param(query, "submadang").as_deref(), Some("general"));
        assert_eq!(query_param(query, "limit").as_deref(), Some("10"));
        assert_eq!(query_param(query, "q").as_deref(), Some("a b!"));
        assert_eq!(query_param(query, "cursor"), None);
        assert_eq!(query_param(Some("flag"), "flag").as_deref(), Some(""));
        assert_eq!(query_param(None, "sort"), None);
    }

    #[test]
    fn test_parse_vote() {
        assert_eq!(parse_vote("upvote"), Some(VoteAction::Upvote));
        assert_eq!(parse_vote("downvote"), Some(VoteAction::Downvote));
        assert_eq!(parse_vote("comments"), None);
    }
}
