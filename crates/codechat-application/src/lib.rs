pub mod execution_usecase;

pub use execution_usecase::ExecutionUseCase;
