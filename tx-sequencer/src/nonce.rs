pub use manager::NonceManager;

mod manager;
mod state;

#[cfg(test)]
mod tests;
