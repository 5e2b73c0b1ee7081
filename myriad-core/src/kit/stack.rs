//! 固定容量字节栈
//!
//! 脚本实例的操作数栈。多字节整数按低位在前逐字节压栈，
//! 读回时必须恢复压栈顺序才能重组出小端编码（见 [`ByteStack::pop_reverse`]）。

use thiserror::Error;

/// 栈故障：空栈弹出 / 批量压栈溢出
///
/// 单字节 push 用返回值报告栈满；批量操作越界则是致命错误，
/// 由调用方决定如何处置（解释器将其映射为 `Invalid` 状态）。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StackError {
    /// 请求的字节数超过当前栈深度
    #[error("attempted to pop {requested} bytes but only {available} are on the stack")]
    Underflow { requested: usize, available: usize },
    /// 批量压栈会超出栈容量
    #[error("pushing {requested} bytes would overflow the stack ({available} of {capacity} free)")]
    Overflow {
        requested: usize,
        available: usize,
        capacity: usize,
    },
}

/// 固定容量的 LIFO 字节容器
#[derive(Debug, Clone)]
pub struct ByteStack {
    buf: Box<[u8]>,
    count: usize,
}

impl ByteStack {
    /// 创建容量为 `size` 字节的空栈
    pub fn new(size: usize) -> Self {
        Self {
            buf: vec![0u8; size].into_boxed_slice(),
            count: 0,
        }
    }

    /// 栈的最大容量
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// 当前栈内字节数
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn is_full(&self) -> bool {
        self.count == self.buf.len()
    }

    /// 压入单个字节；栈满时返回 false 且不修改栈
    #[must_use]
    pub fn push(&mut self, value: u8) -> bool {
        if self.is_full() {
            return false;
        }
        self.buf[self.count] = value;
        self.count += 1;
        true
    }

    /// 批量压栈，保持切片顺序（`bytes[0]` 先入栈）
    ///
    /// 空间不足时整体失败，不做部分写入。
    pub fn push_slice(&mut self, bytes: &[u8]) -> Result<(), StackError> {
        let free = self.buf.len() - self.count;
        if bytes.len() > free {
            return Err(StackError::Overflow {
                requested: bytes.len(),
                available: free,
                capacity: self.buf.len(),
            });
        }
        self.buf[self.count..self.count + bytes.len()].copy_from_slice(bytes);
        self.count += bytes.len();
        Ok(())
    }

    /// 弹出栈顶字节
    pub fn pop(&mut self) -> Result<u8, StackError> {
        if self.count == 0 {
            return Err(StackError::Underflow {
                requested: 1,
                available: 0,
            });
        }
        self.count -= 1;
        Ok(self.buf[self.count])
    }

    /// 弹出 `count` 个字节，按弹出顺序返回（栈顶在前）
    pub fn pop_n(&mut self, count: usize) -> Result<Vec<u8>, StackError> {
        if count > self.count {
            return Err(StackError::Underflow {
                requested: count,
                available: self.count,
            });
        }
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            self.count -= 1;
            out.push(self.buf[self.count]);
        }
        Ok(out)
    }

    /// 弹出 `count` 个字节并恢复为压栈顺序
    ///
    /// 逐字节压入的小端整数经此读回即为连续的小端缓冲。
    pub fn pop_reverse(&mut self, count: usize) -> Result<Vec<u8>, StackError> {
        let mut bytes = self.pop_n(count)?;
        bytes.reverse();
        Ok(bytes)
    }

    /// 读取栈顶字节，不消耗
    pub fn peek(&self) -> Result<u8, StackError> {
        if self.count == 0 {
            return Err(StackError::Underflow {
                requested: 1,
                available: 0,
            });
        }
        Ok(self.buf[self.count - 1])
    }

    /// 读取栈顶 `count` 个字节，不消耗，按弹出顺序返回
    pub fn peek_n(&self, count: usize) -> Result<Vec<u8>, StackError> {
        if count > self.count {
            return Err(StackError::Underflow {
                requested: count,
                available: self.count,
            });
        }
        Ok((0..count).map(|i| self.buf[self.count - 1 - i]).collect())
    }

    /// 清空栈（容量不变，不触碰存储内容）
    pub fn clear(&mut self) {
        self.count = 0;
    }
}
