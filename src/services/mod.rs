// Promptbook services
// Credential storage, the OAuth and Drive clients, the sync reconciler,
// import merging and settings.

pub mod auth_manager;
pub mod credential_cipher;
pub mod drive_store;
pub mod import_merge;
pub mod oauth_client;
pub mod remote_backup;
pub mod settings_engine;
pub mod sync_reconciler;
pub mod token_store;
