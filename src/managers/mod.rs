// Promptbook state managers
// Managers own mutable application state: the prompt library.

pub mod library_manager;
