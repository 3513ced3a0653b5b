use std::ffi::c_void;

use minhook::MinHook;

use shared_dx::error::{HookError, Result};

use crate::installer::CodePatcher;

/// Inline patching through MinHook.  MinHook handles page protection and instruction
/// relocation; a protection failure comes back as a status we report as `PatchFailure`.
#[derive(Default)]
pub struct MinHookPatcher;

impl CodePatcher for MinHookPatcher {
    unsafe fn patch(&mut self, target: usize, replacement: usize) -> Result<usize> {
        // MinHook creates hooks disabled
        let trampoline =
            MinHook::create_hook(target as *mut c_void, replacement as *mut c_void).map_err(
                |status| {
                    HookError::PatchFailure(format!("create hook at {:x}: {:?}", target, status))
                },
            )?;
        Ok(trampoline as usize)
    }

    unsafe fn set_enabled(&mut self, target: usize, enabled: bool) -> Result<()> {
        let r = if enabled {
            MinHook::enable_hook(target as *mut c_void)
        } else {
            MinHook::disable_hook(target as *mut c_void)
        };
        r.map_err(|status| {
            HookError::PatchFailure(format!(
                "{} hook at {:x}: {:?}",
                if enabled { "enable" } else { "disable" },
                target,
                status
            ))
        })
    }

    unsafe fn unpatch(&mut self, target: usize) -> Result<()> {
        MinHook::remove_hook(target as *mut c_void).map_err(|status| {
            HookError::PatchFailure(format!("remove hook at {:x}: {:?}", target, status))
        })
    }
}
