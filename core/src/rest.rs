//! Request factory bound to one service's base URL, path and credential.

use ureq::Agent;
use url::Url;

use crate::http::{BasicAuthentication, HttpMethod};
use crate::request::Request;

#[derive(Debug, Clone)]
pub struct RestClient {
    agent: Agent,
    base_url: Url,
    api_path: String,
    basic_auth: Option<BasicAuthentication>,
}

impl RestClient {
    pub fn new(agent: Agent, base_url: Url, api_path: &str) -> Self {
        Self {
            agent,
            base_url,
            api_path: api_path.to_string(),
            basic_auth: None,
        }
    }

    /// Attach `auth` to every request this client creates.
    pub fn basic_authentication(mut self, auth: Option<BasicAuthentication>) -> Self {
        self.basic_auth = auth;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn api_path(&self) -> &str {
        &self.api_path
    }

    pub fn credentials(&self) -> Option<&BasicAuthentication> {
        self.basic_auth.as_ref()
    }

    pub fn verb(&self, verb: HttpMethod) -> Request {
        Request::new(self.agent.clone(), verb, self.base_url.clone(), &self.api_path)
            .basic_authentication(self.basic_auth.clone())
    }

    pub fn get(&self) -> Request {
        self.verb(HttpMethod::Get)
    }

    pub fn post(&self) -> Request {
        self.verb(HttpMethod::Post)
    }

    pub fn put(&self) -> Request {
        self.verb(HttpMethod::Put)
    }

    pub fn delete(&self) -> Request {
        self.verb(HttpMethod::Delete)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ResourceType;

    #[test]
    fn requests_inherit_base_and_path() {
        let client = RestClient::new(
            Agent::new_with_defaults(),
            Url::parse("https://turbo.example.com").unwrap(),
            "vmturbo/rest",
        );
        let r = client.post().resource(ResourceType::Targets);
        assert_eq!(r.verb(), HttpMethod::Post);
        assert_eq!(r.url().as_str(), "https://turbo.example.com/vmturbo/rest/targets");
        assert_eq!(client.delete().verb(), HttpMethod::Delete);
    }

    #[test]
    fn credentials_are_optional() {
        let base = Url::parse("http://localhost").unwrap();
        let anonymous = RestClient::new(Agent::new_with_defaults(), base.clone(), "/");
        assert!(anonymous.credentials().is_none());
        let authed = RestClient::new(Agent::new_with_defaults(), base, "/")
            .basic_authentication(Some(BasicAuthentication::new("foo", "bar")));
        assert_eq!(authed.credentials().map(|c| c.username()), Some("foo"));
    }
}
