//! Pull request diff reporting against a live Argo CD server.
//!
//! Resolves the pull request's change set, selects the affected Argo CD
//! applications, runs `argocd app diff` for each, and publishes a single
//! summary comment on the pull request.

pub mod argocd;
pub mod github;
pub mod install;
pub mod pipeline;
pub mod publish;
pub mod report;
pub mod runner;
pub mod select;
